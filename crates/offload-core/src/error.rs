//! Error types for the training offloading runtime

use thiserror::Error;

/// Result type alias using the offloading Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the training offloading runtime
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    // Node errors
    #[error("Duplicate pipeline node: {name}")]
    DuplicateNode { name: String },

    // Lifecycle errors
    #[error("Invalid state for {operation}: {reason}")]
    InvalidState { operation: String, reason: String },

    // Receive deadline errors
    #[error("Operation timeout: {operation} after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    // Pipeline runtime errors
    #[error("Pipeline not found: {pipeline}")]
    PipelineNotFound { pipeline: String },

    #[error("Pipeline element not found: {element}")]
    ElementNotFound { element: String },

    #[error("Sink already registered on element: {element}")]
    SinkAlreadyRegistered { element: String },

    #[error("Pipeline runtime error: {message}")]
    Pipeline { message: String },

    // Transport errors
    #[error("Transport error: {message}")]
    Transport { message: String },

    // I/O errors
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Channel errors
    #[error("Channel closed: {channel}")]
    ChannelClosed { channel: String },
}

impl Error {
    /// Returns true if this error stems from a malformed or rejected
    /// configuration document
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig { .. } | Error::DuplicateNode { .. }
        )
    }

    /// Returns true if this error is the receive-completeness deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = Error::InvalidConfig {
            message: "missing required field".to_string(),
        };
        assert!(err.is_config());
        assert!(!err.is_timeout());

        let err = Error::Timeout {
            operation: "receive".to_string(),
            timeout_ms: 10_000,
        };
        assert!(err.is_timeout());
        assert!(!err.is_config());
    }

    #[test]
    fn test_error_context_in_message() {
        let err = Error::DuplicateNode {
            name: "training0".to_string(),
        };
        assert!(err.to_string().contains("training0"));

        let err = Error::ElementNotFound {
            element: "datareposink0".to_string(),
        };
        assert!(err.to_string().contains("datareposink0"));
    }
}
