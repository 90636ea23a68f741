use std::fmt;

use thiserror::Error;

/// External service a failure originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamService {
    Embedding,
    Index,
    Generation,
}

impl fmt::Display for UpstreamService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Embedding => "embedding",
            Self::Index => "vector index",
            Self::Generation => "generation",
        };
        f.write_str(name)
    }
}

/// RAG pipeline errors
///
/// Zero retrieved records or zero generated fragments are valid outcomes and
/// never produce one of these.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{service} service unavailable: {message}")]
    UpstreamUnavailable {
        service: UpstreamService,
        message: String,
    },

    #[error("{service} service error{}: {message}", status_suffix(.status_code))]
    UpstreamError {
        service: UpstreamService,
        status_code: Option<u16>,
        message: String,
    },

    #[error("Configuration Error: {0}")]
    ConfigError(String),
}

fn status_suffix(status_code: &Option<u16>) -> String {
    status_code
        .map(|code| format!(" (HTTP {})", code))
        .unwrap_or_default()
}

impl RagError {
    pub fn unavailable(service: UpstreamService, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service,
            message: message.into(),
        }
    }

    pub fn upstream(service: UpstreamService, message: impl Into<String>) -> Self {
        Self::UpstreamError {
            service,
            status_code: None,
            message: message.into(),
        }
    }

    pub fn http_status(service: UpstreamService, status_code: u16, message: impl Into<String>) -> Self {
        Self::UpstreamError {
            service,
            status_code: Some(status_code),
            message: message.into(),
        }
    }

    /// Classify a transport error from `reqwest`.
    ///
    /// Connection, timeout and request-building failures mean the service
    /// could not be reached; everything else happened after it answered.
    pub fn from_reqwest(service: UpstreamService, err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            Self::unavailable(service, err.to_string())
        } else {
            Self::UpstreamError {
                service,
                status_code: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::UpstreamError { .. } => "upstream_error",
            Self::ConfigError(_) => "configuration_error",
        }
    }

    /// Only an unreachable service is worth a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }
}

/// Result type for RAG operations
pub type RagResult<T> = Result<T, RagError>;
