//! Error type shared by every fallible operation in the crate.

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, LSTMError>;

/// Errors raised while building, running or training an LSTM
#[derive(thiserror::Error, Debug)]
pub enum LSTMError {
    #[error("Dimension mismatch for {what}: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("Sequence must contain at least one time step")]
    EmptySequence,

    #[error("No cached forward input for backward pass")]
    MissingCache,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParseError(#[from] serde_json::Error),
}

impl LSTMError {
    pub(crate) fn mismatch(what: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        LSTMError::DimensionMismatch {
            what,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

/// Fails with `DimensionMismatch` unless `actual` equals `expected`
pub(crate) fn ensure_shape(what: &'static str, expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(LSTMError::mismatch(what, expected, actual))
    }
}
