use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepscopeError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Insufficient data for {operation}: needed {needed} samples, got {got}")]
    InsufficientData {
        operation: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("Invalid geometry: {details}")]
    InvalidGeometry { details: String },

    #[error("Frame {index} is out of temporal order")]
    NonMonotonicFrame { index: u64 },
}

impl RepscopeError {
    pub fn insufficient_data(operation: &'static str, needed: usize, got: usize) -> Self {
        Self::InsufficientData {
            operation,
            needed,
            got,
        }
    }
}

pub type Result<T> = std::result::Result<T, RepscopeError>;
