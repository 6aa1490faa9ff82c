#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod em;
pub mod error;
pub mod finiteem;
pub mod genotype;
pub mod likelihood;
pub mod pileup;
pub mod root;
pub mod seqem;

pub use em::{Em, EmModel, EmState, StopRule};
pub use error::EmError;
pub use finiteem::{FiniteTheta, Finiteem};
pub use genotype::{Allele, Genotype};
pub use pileup::{PileupData, Region, Site};
pub use seqem::{SeqTheta, Seqem};
