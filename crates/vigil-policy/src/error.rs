use std::fmt;
use thiserror::Error;
use vigil_core::VigilError;

use crate::types::DenyReason;

/// Configuration defects found while loading or evaluating policies.
///
/// None of these is a denial. Each one means the policy data or the request
/// metadata is corrupt or inconsistent, and evaluation was aborted. Callers
/// must surface them to operators rather than retry.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("unknown principal type '{principal_type}' in principal '{entry}'")]
    UnknownPrincipalType {
        principal_type: String,
        entry: String,
    },

    #[error("malformed principal '{0}': expected '<type>:<uuid pattern>'")]
    MalformedPrincipal(String),

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("pattern exceeds maximum {max} characters (length: {length})")]
    PatternTooLong { max: usize, length: usize },

    #[error("malformed action '{action}': {reason}")]
    MalformedAction { action: String, reason: String },

    #[error("request type '{request_type}' has no field '{field}'")]
    UnknownField { request_type: String, field: String },

    #[error("unknown request type: {0}")]
    UnknownRequestType(String),

    #[error("invalid session: {0}")]
    InvalidSession(String),

    #[error("policy provider error: {0}")]
    Provider(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Discriminator for PolicyError variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyErrorKind {
    UnknownPrincipalType,
    MalformedPrincipal,
    InvalidPattern,
    PatternTooLong,
    MalformedAction,
    UnknownField,
    UnknownRequestType,
    InvalidSession,
    Provider,
    ValidationError,
}

impl PolicyError {
    pub fn kind(&self) -> PolicyErrorKind {
        match self {
            PolicyError::UnknownPrincipalType { .. } => PolicyErrorKind::UnknownPrincipalType,
            PolicyError::MalformedPrincipal(_) => PolicyErrorKind::MalformedPrincipal,
            PolicyError::InvalidPattern { .. } => PolicyErrorKind::InvalidPattern,
            PolicyError::PatternTooLong { .. } => PolicyErrorKind::PatternTooLong,
            PolicyError::MalformedAction { .. } => PolicyErrorKind::MalformedAction,
            PolicyError::UnknownField { .. } => PolicyErrorKind::UnknownField,
            PolicyError::UnknownRequestType(_) => PolicyErrorKind::UnknownRequestType,
            PolicyError::InvalidSession(_) => PolicyErrorKind::InvalidSession,
            PolicyError::Provider(_) => PolicyErrorKind::Provider,
            PolicyError::ValidationError(_) => PolicyErrorKind::ValidationError,
        }
    }
}

impl fmt::Display for PolicyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyErrorKind::UnknownPrincipalType => write!(f, "UnknownPrincipalType"),
            PolicyErrorKind::MalformedPrincipal => write!(f, "MalformedPrincipal"),
            PolicyErrorKind::InvalidPattern => write!(f, "InvalidPattern"),
            PolicyErrorKind::PatternTooLong => write!(f, "PatternTooLong"),
            PolicyErrorKind::MalformedAction => write!(f, "MalformedAction"),
            PolicyErrorKind::UnknownField => write!(f, "UnknownField"),
            PolicyErrorKind::UnknownRequestType => write!(f, "UnknownRequestType"),
            PolicyErrorKind::InvalidSession => write!(f, "InvalidSession"),
            PolicyErrorKind::Provider => write!(f, "Provider"),
            PolicyErrorKind::ValidationError => write!(f, "ValidationError"),
        }
    }
}

impl From<VigilError> for PolicyError {
    fn from(err: VigilError) -> Self {
        match err {
            VigilError::UnknownField {
                request_type,
                field,
            } => PolicyError::UnknownField {
                request_type,
                field,
            },
            VigilError::UnknownRequestType(request_type) => {
                PolicyError::UnknownRequestType(request_type)
            }
            VigilError::InvalidSession(msg) => PolicyError::InvalidSession(msg),
            VigilError::Provider(msg) => PolicyError::Provider(msg),
        }
    }
}

pub type PolicyResult<T> = Result<T, PolicyError>;

/// Outcome of [`crate::AuthorizationEngine::check`]: either the request was
/// denied, or the evaluation could not complete because of a defect.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("{0}")]
    Denied(DenyReason),

    #[error("authorization configuration error: {0}")]
    Configuration(#[from] PolicyError),
}

impl CheckError {
    pub fn is_denied(&self) -> bool {
        matches!(self, CheckError::Denied(_))
    }
}
