use thiserror::Error;

/// Errors raised by collaborators shared across vigil crates.
#[derive(Debug, Error)]
pub enum VigilError {
    #[error("request type '{request_type}' has no field '{field}'")]
    UnknownField { request_type: String, field: String },

    #[error("unknown request type: {0}")]
    UnknownRequestType(String),

    #[error("policy provider error: {0}")]
    Provider(String),

    #[error("invalid session: {0}")]
    InvalidSession(String),
}

pub type VigilResult<T> = Result<T, VigilError>;
