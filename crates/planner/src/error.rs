//! Error types for the planner.

use thiserror::Error;

/// Errors that can occur while talking to the external planner services,
/// loading configuration or handling session requests.
#[derive(Debug, Error, Clone)]
pub enum PlannerError {
    /// Network/HTTP request failed
    #[error("Network error: {message}")]
    Network { message: String },

    /// Server returned an unexpected response
    #[error("Unexpected response: {message}")]
    UnexpectedResponse { message: String },

    /// Failed to parse JSON or text content
    #[error("Parse error: {message}")]
    ParseError { message: String },

    /// URL parsing/construction failed
    #[error("URL error: {message}")]
    UrlError { message: String },

    /// Configuration could not be read
    #[error("Config error: {message}")]
    Config { message: String },

    /// A course record failed strict validation
    #[error("Invalid course record: {message}")]
    InvalidRecord { message: String },

    /// The generator reported a failure on the event stream
    #[error("Generation failed: {message}")]
    GenerationFailed { message: String },

    /// The event stream closed before a completion event arrived
    #[error("Generation stream ended before completion")]
    StreamIncomplete,

    /// A candidate index outside the current candidate set was requested
    #[error("Candidate {index} out of range ({len} candidates)")]
    CandidateOutOfRange { index: usize, len: usize },
}

impl PlannerError {
    /// Returns true if this error is potentially transient and retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlannerError::Network { .. }
                | PlannerError::UnexpectedResponse { .. }
                | PlannerError::StreamIncomplete
        )
    }
}

impl From<reqwest::Error> for PlannerError {
    fn from(err: reqwest::Error) -> Self {
        PlannerError::Network {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for PlannerError {
    fn from(err: url::ParseError) -> Self {
        PlannerError::UrlError {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PlannerError {
    fn from(err: serde_json::Error) -> Self {
        PlannerError::ParseError {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for PlannerError {
    fn from(err: std::io::Error) -> Self {
        PlannerError::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(PlannerError::Network {
            message: "reset".into()
        }
        .is_retryable());
        assert!(PlannerError::StreamIncomplete.is_retryable());
        assert!(!PlannerError::CandidateOutOfRange { index: 3, len: 1 }.is_retryable());
    }

    #[test]
    fn test_json_error_maps_to_parse_error() {
        let err: PlannerError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, PlannerError::ParseError { .. }));
    }
}
