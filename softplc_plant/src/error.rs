use thiserror::Error;

/// Failure of one plant exchange or of the initial connection.
///
/// `Exception` and `Transport` are the two outcomes the exchange helper
/// classifies; both are soft inside a control cycle.
#[derive(Debug, Error)]
pub enum PlantError {
    /// Remote answered with an exception response.
    #[error("{function}: modbus exception {code}")]
    Exception { function: &'static str, code: String },
    #[error("{function}: transport error: {message}")]
    Transport {
        function: &'static str,
        message: String,
    },
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl PlantError {
    pub fn is_exception(&self) -> bool {
        matches!(self, PlantError::Exception { .. })
    }
}

pub type Result<T> = std::result::Result<T, PlantError>;
