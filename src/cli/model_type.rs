use std::fmt;

use clap::{builder::PossibleValue, ValueEnum};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ModelType {
    Seqem,
    Finite,
}

impl ValueEnum for ModelType {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Seqem, Self::Finite]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(match self {
            Self::Seqem => PossibleValue::new("seqem").help("Sequencing error rate"),
            Self::Finite => {
                PossibleValue::new("finite").help("Finite alleles model (after seqem)")
            }
        })
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Seqem => write!(f, "seqem"),
            Self::Finite => write!(f, "finite"),
        }
    }
}
