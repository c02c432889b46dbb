use std::time::Duration;

use thiserror::Error;

/// A record that does not meet the field-count / numeric contract
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Malformed record: {reason}")]
    Malformed { reason: String },
}

impl ParseError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        ParseError::Malformed {
            reason: reason.into(),
        }
    }
}

/// Failures reported by a record source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("No record within {0:?}")]
    Timeout(Duration),

    #[error("Source closed")]
    Closed,

    #[error("Transport failure: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Timeouts are recovered by the coordinator; everything else ends the session
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SourceError::Timeout(_))
    }
}

/// Errors that end a coordinator run
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Source failed: {0}")]
    Source(#[from] SourceError),

    #[error("Source silent for {stalls} consecutive receive windows")]
    SourceStalled { stalls: u32 },

    #[error("Coordinator already stopped")]
    AlreadyStopped,
}

impl StreamError {
    /// End of a finite source (replay) rather than a transport failure
    pub fn is_source_closed(&self) -> bool {
        matches!(self, StreamError::Source(SourceError::Closed))
    }
}

/// Invalid engine configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for stream operations
pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(!SourceError::Timeout(Duration::from_secs(2)).is_fatal());
        assert!(SourceError::Closed.is_fatal());

        let err = StreamError::from(SourceError::Closed);
        assert!(err.is_source_closed());
        assert!(!StreamError::SourceStalled { stalls: 3 }.is_source_closed());
    }

    #[test]
    fn test_malformed_message() {
        let err = ParseError::malformed("expected at least 15 fields, got 3");
        assert_eq!(
            err.to_string(),
            "Malformed record: expected at least 15 fields, got 3"
        );
    }
}
