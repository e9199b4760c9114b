use thiserror::Error;

#[derive(Error, Debug)]
pub enum McpError {
    #[error("mcp session not ready")]
    NotReady,

    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("parameter error: {0}")]
    ParameterError(String),

    #[error("tool call error: {0}")]
    RemoteError(String),

    #[error("tool call timed out after {0}ms")]
    Timeout(u64),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("failed to reconnect provider '{provider}': {reason}")]
    ReconnectError { provider: String, reason: String },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("authentication error: {0}")]
    AuthError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl McpError {
    /// Whether the fleet may tear the session down and try again.
    ///
    /// Only faults attributable to the connection qualify. Remote errors
    /// belong to the tool itself and local validation failures would fail
    /// the same way on a fresh session.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::TransportError(_) | Self::ReconnectError { .. }
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotReady => "NOT_READY",
            Self::NotFound(_) => "NOT_FOUND",
            Self::ParameterError(_) => "PARAMETER_ERROR",
            Self::RemoteError(_) => "REMOTE_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::TransportError(_) => "TRANSPORT_ERROR",
            Self::ReconnectError { .. } => "RECONNECT_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::AuthError(_) => "AUTHENTICATION_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(McpError::Timeout(10).is_retryable());
        assert!(McpError::TransportError("closed".to_string()).is_retryable());
        assert!(McpError::ReconnectError {
            provider: "weather".to_string(),
            reason: "refused".to_string(),
        }
        .is_retryable());

        assert!(!McpError::RemoteError("bad".to_string()).is_retryable());
        assert!(!McpError::NotReady.is_retryable());
        assert!(!McpError::NotFound("x".to_string()).is_retryable());
        assert!(!McpError::ParameterError("x".to_string()).is_retryable());
    }

    #[test]
    fn test_remote_error_message_is_kept() {
        let err = McpError::RemoteError("bad".to_string());
        assert!(err.to_string().contains("bad"));
        assert_eq!(err.error_code(), "REMOTE_ERROR");
    }
}
