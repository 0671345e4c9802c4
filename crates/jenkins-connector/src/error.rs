use std::path::PathBuf;

/// Maximum number of response body characters carried inside an error message.
const BODY_EXCERPT_LIMIT: usize = 200;

/// Every failure the Jenkins integration core can report.
///
/// `Configuration` and `CertificateLoad` only occur while the executor is being
/// constructed and abort startup; every other kind is returned per call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JenkinsError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to load certificate material from '{}': {reason}", path.display())]
    CertificateLoad { path: PathBuf, reason: String },

    #[error("{operation}: authentication failed: {message}")]
    Authentication { operation: String, message: String },

    #[error("{operation}: permission denied: {message}")]
    Authorization { operation: String, message: String },

    #[error("{operation}: not found: {message}")]
    NotFound { operation: String, message: String },

    #[error("{operation}: request rejected: {message}")]
    Validation { operation: String, message: String },

    /// `timeout_ms` is `None` when the deadline had already passed before the
    /// first attempt.
    #[error("{operation}: {}", describe_timeout(.timeout_ms))]
    Timeout {
        operation: String,
        timeout_ms: Option<u64>,
    },

    #[error("{operation}: network failure after {attempts} attempt(s): {message}")]
    Network {
        operation: String,
        attempts: u32,
        message: String,
    },

    #[error("{operation}: server returned HTTP {status} after {attempts} attempt(s): {message}")]
    Server {
        operation: String,
        status: u16,
        attempts: u32,
        message: String,
    },

    #[error("{operation}: unexpected HTTP {status}: {message}")]
    UnexpectedStatus {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("{operation}: invalid response: {message}")]
    InvalidResponse { operation: String, message: String },

    #[error("Invalid resource address '{input}': {reason}")]
    AddressParse { input: String, reason: String },
}

impl JenkinsError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn address(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AddressParse {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_response(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidResponse {
            operation: operation.into(),
            message: msg.into(),
        }
    }

    /// Re-attribute a per-call error to `operation`.
    pub fn with_operation(self, operation: &str) -> Self {
        let op = operation.to_string();
        match self {
            Self::Authentication { message, .. } => Self::Authentication { operation: op, message },
            Self::Authorization { message, .. } => Self::Authorization { operation: op, message },
            Self::NotFound { message, .. } => Self::NotFound { operation: op, message },
            Self::Validation { message, .. } => Self::Validation { operation: op, message },
            Self::Timeout { timeout_ms, .. } => Self::Timeout { operation: op, timeout_ms },
            Self::Network { attempts, message, .. } => Self::Network {
                operation: op,
                attempts,
                message,
            },
            Self::Server {
                status,
                attempts,
                message,
                ..
            } => Self::Server {
                operation: op,
                status,
                attempts,
                message,
            },
            Self::UnexpectedStatus { status, message, .. } => Self::UnexpectedStatus {
                operation: op,
                status,
                message,
            },
            Self::InvalidResponse { message, .. } => Self::InvalidResponse { operation: op, message },
            other => other,
        }
    }

    /// Errors that can only arise at startup and must abort initialization.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::CertificateLoad { .. })
    }

    /// Errors worth retrying at the transport level.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Network { .. } | Self::Server { .. }
        )
    }

    /// Stable, machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::CertificateLoad { .. } => "certificate_load",
            Self::Authentication { .. } => "authentication",
            Self::Authorization { .. } => "authorization",
            Self::NotFound { .. } => "not_found",
            Self::Validation { .. } => "validation",
            Self::Timeout { .. } => "timeout",
            Self::Network { .. } => "network",
            Self::Server { .. } => "server",
            Self::UnexpectedStatus { .. } => "unexpected_status",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::AddressParse { .. } => "address_parse",
        }
    }

    /// Name of the operation that failed, when the error is tied to one.
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::Authentication { operation, .. }
            | Self::Authorization { operation, .. }
            | Self::NotFound { operation, .. }
            | Self::Validation { operation, .. }
            | Self::Timeout { operation, .. }
            | Self::Network { operation, .. }
            | Self::Server { operation, .. }
            | Self::UnexpectedStatus { operation, .. }
            | Self::InvalidResponse { operation, .. } => Some(operation),
            Self::Configuration(_) | Self::CertificateLoad { .. } | Self::AddressParse { .. } => {
                None
            }
        }
    }

    /// Map a non-2xx status that is not subject to retry into its error kind.
    pub(crate) fn from_status(operation: &str, status: u16, body: &str) -> Self {
        let operation = operation.to_string();
        let message = excerpt(body);
        match status {
            401 => Self::Authentication { operation, message },
            403 => Self::Authorization { operation, message },
            404 => Self::NotFound { operation, message },
            400 | 422 => Self::Validation { operation, message },
            _ => Self::UnexpectedStatus {
                operation,
                status,
                message,
            },
        }
    }
}

fn describe_timeout(timeout_ms: &Option<u64>) -> String {
    match timeout_ms {
        Some(ms) => format!("timed out after {}ms", ms),
        None => "deadline exceeded before the request was sent".to_string(),
    }
}

/// Trim a response body to something safe to embed in an error message.
pub(crate) fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    if trimmed.chars().count() <= BODY_EXCERPT_LIMIT {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(BODY_EXCERPT_LIMIT).collect();
    format!("{}...", cut)
}

pub type JenkinsResult<T> = Result<T, JenkinsError>;
