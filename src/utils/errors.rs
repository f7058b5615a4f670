use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum MindForgeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl MindForgeError {
    /// Whether this error came from the transport rather than the service.
    pub fn is_transport(&self) -> bool {
        matches!(self, MindForgeError::NetworkError(_))
    }
}

impl From<std::io::Error> for MindForgeError {
    fn from(err: std::io::Error) -> Self {
        MindForgeError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for MindForgeError {
    fn from(err: serde_json::Error) -> Self {
        MindForgeError::ParseError(err.to_string())
    }
}

impl From<reqwest::Error> for MindForgeError {
    fn from(err: reqwest::Error) -> Self {
        MindForgeError::NetworkError(err.to_string())
    }
}

impl<T> From<tokio::sync::broadcast::error::SendError<T>> for MindForgeError {
    fn from(err: tokio::sync::broadcast::error::SendError<T>) -> Self {
        MindForgeError::EventError(format!("Failed to send event: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let error = MindForgeError::ApiError {
            status: 404,
            message: "Session not found".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "API error (status 404): Session not found"
        );
    }

    #[test]
    fn test_network_error_is_transport() {
        let error = MindForgeError::NetworkError("connection refused".to_string());
        assert!(error.is_transport());
        assert!(!MindForgeError::ParseError("bad json".to_string()).is_transport());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = MindForgeError::from(io_error);
        match error {
            MindForgeError::IoError(msg) => assert!(msg.contains("file not found")),
            _ => panic!("Expected IoError variant"),
        }
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error = MindForgeError::from(json_error);
        assert!(matches!(error, MindForgeError::ParseError(_)));
    }

    #[test]
    fn test_broadcast_send_error_conversion() {
        let (tx, rx) = tokio::sync::broadcast::channel::<String>(1);
        drop(rx);
        let send_error = tx.send("message".to_string()).unwrap_err();
        let error = MindForgeError::from(send_error);
        match error {
            MindForgeError::EventError(msg) => assert!(msg.contains("Failed to send event")),
            _ => panic!("Expected EventError variant"),
        }
    }
}
