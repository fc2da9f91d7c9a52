use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum PlcError {
    /// Remote answered with an exception response (high-bit function code).
    #[error("protocol exception: {0}")]
    Exception(String),
    /// Connection-level failure (refused, reset, timed out).
    #[error("plant transport error: {0}")]
    Transport(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
    #[error("snapshot log write failed: {0}")]
    Log(String),
    #[error("register {bank} {address} out of range")]
    OutOfRange { bank: &'static str, address: u16 },
    #[error("multi-value write over mapped address {address} rejected")]
    MultiWrite { address: u16 },
}

impl PlcError {
    /// Soft errors are logged and the cycle continues; everything else ends the run.
    pub fn is_soft(&self) -> bool {
        matches!(self, PlcError::Exception(_) | PlcError::Transport(_))
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing plant connection")]
    MissingPlant,
    #[error("missing shared context")]
    MissingContext,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
