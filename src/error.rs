use thiserror::Error;

/// Errors raised by the estimation core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmError {
    /// Bad ploidy or malformed initial parameters.  Raised at construction.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A parameter left its valid domain or a derivative vanished
    #[error("Numerical failure: {0}")]
    NumericalFailure(String),
}

impl EmError {
    pub fn config<S: Into<String>>(s: S) -> Self {
        Self::InvalidConfiguration(s.into())
    }

    pub fn numerical<S: Into<String>>(s: S) -> Self {
        Self::NumericalFailure(s.into())
    }
}

pub type Result<T> = std::result::Result<T, EmError>;
