use folio_core::{Fault, FaultKind};
use thiserror::Error;

/// NetworkError represents all possible errors that can occur while fetching site resources
#[derive(Error, Debug)]
pub enum NetworkError {
    /// HTTP client errors
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    /// Non-success status code
    #[error("HTTP error! status: {status} ({url})")]
    StatusError { status: u16, url: String },

    /// Connection errors
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Timeout errors
    #[error("Request timed out after {0:?}")]
    TimeoutError(std::time::Duration),

    /// Resource loading errors
    #[error("Resource loading error: {0}")]
    ResourceError(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl NetworkError {
    /// Returns true if the error is likely temporary and the request could be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::ConnectionError(_) | NetworkError::TimeoutError(_) => true,
            NetworkError::HttpError(e) => e.is_connect() || e.is_timeout(),
            NetworkError::StatusError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Status code carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            NetworkError::StatusError { status, .. } => Some(*status),
            NetworkError::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl Fault for NetworkError {
    fn fault_kind(&self) -> FaultKind {
        match self {
            NetworkError::HttpError(e) if e.is_decode() => FaultKind::Syntax,
            NetworkError::HttpError(_)
            | NetworkError::ConnectionError(_)
            | NetworkError::TimeoutError(_) => FaultKind::Transport,
            NetworkError::SerializationError(_) => FaultKind::Syntax,
            _ => FaultKind::Other,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            NetworkError::HttpError(_)
            | NetworkError::ConnectionError(_)
            | NetworkError::TimeoutError(_) => "TypeError",
            NetworkError::SerializationError(_) => "SyntaxError",
            _ => "NetworkError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::ErrorCategory;

    fn classify(err: &NetworkError) -> ErrorCategory {
        ErrorCategory::classify(err.fault_kind(), &err.to_string())
    }

    #[test]
    fn test_status_errors_classify_by_code() {
        let missing = NetworkError::StatusError {
            status: 404,
            url: "/data/content.json".into(),
        };
        let forbidden = NetworkError::StatusError {
            status: 403,
            url: "/admin".into(),
        };
        assert_eq!(classify(&missing), ErrorCategory::Resource);
        assert_eq!(classify(&forbidden), ErrorCategory::Permission);
        assert!(!missing.is_retryable());
        assert_eq!(missing.status(), Some(404));
    }

    #[test]
    fn test_transport_errors_are_network() {
        let err = NetworkError::ConnectionError("refused".into());
        assert_eq!(classify(&err), ErrorCategory::Network);
        assert!(err.is_retryable());

        let server = NetworkError::StatusError {
            status: 503,
            url: "/".into(),
        };
        assert!(server.is_retryable());
    }

    #[test]
    fn test_bad_json_is_parse() {
        let err: NetworkError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert_eq!(classify(&err), ErrorCategory::Parse);
    }
}
