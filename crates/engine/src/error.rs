use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The layer or native object is not present in this engine.
    NotFound(String),
    Failed(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotFound(what) => write!(f, "not found: {what}"),
            EngineError::Failed(msg) => write!(f, "engine operation failed: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<foundation::math::ProjectionError> for EngineError {
    fn from(e: foundation::math::ProjectionError) -> Self {
        EngineError::Failed(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
