//! Engine error taxonomy

use crate::models::ConfigKind;

/// Failure reported by the cluster API seam
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Upstream unavailable: {0}")]
    Unavailable(String),
}

impl From<kube::Error> for ApiError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => ApiError::NotFound(ae.message),
            kube::Error::Api(ae) if ae.code == 401 || ae.code == 403 => {
                ApiError::Forbidden(ae.message)
            }
            other => ApiError::Unavailable(other.to_string()),
        }
    }
}

/// Request-level errors of the config service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("{kind} {namespace}/{name} not found")]
    ObjectNotFound {
        kind: ConfigKind,
        namespace: String,
        name: String,
    },

    #[error("Unknown config kind: {0}")]
    UnknownKind(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    #[error(transparent)]
    Upstream(#[from] ApiError),
}

impl EngineError {
    /// HTTP-equivalent status for the error
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::NamespaceNotFound(_) | EngineError::ObjectNotFound { .. } => 404,
            EngineError::UnknownKind(_) => 400,
            EngineError::Cancelled => 499,
            EngineError::DeadlineExceeded => 504,
            EngineError::Upstream(ApiError::NotFound(_)) => 404,
            EngineError::Upstream(ApiError::Forbidden(_)) => 403,
            EngineError::Upstream(ApiError::Unavailable(_)) => 503,
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
