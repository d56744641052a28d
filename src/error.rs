use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClipError>;

/// Failures a scrape or submit flow can end with.
///
/// A model reply that is not JSON at all is not an error: it is recovered
/// into sentinel values by the structuring step.
#[derive(Debug, Error)]
pub enum ClipError {
    /// Host capability missing (no active page, runtime unavailable)
    #[error("{0}")]
    Environment(String),

    /// The page produced no usable text
    #[error("{0}")]
    Extraction(String),

    /// Request never got a response
    #[error("{0}")]
    Transport(String),

    /// Upstream answered with a non-success status
    #[error("{0}")]
    Api(String),

    /// Response parsed but did not have the expected shape
    #[error("{0}")]
    UnexpectedResponse(String),

    #[error("{0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClipError {
    /// Prefixes the message while keeping the variant.
    pub fn context(self, prefix: &str) -> Self {
        match self {
            Self::Environment(m) => Self::Environment(format!("{prefix}: {m}")),
            Self::Extraction(m) => Self::Extraction(format!("{prefix}: {m}")),
            Self::Transport(m) => Self::Transport(format!("{prefix}: {m}")),
            Self::Api(m) => Self::Api(format!("{prefix}: {m}")),
            Self::UnexpectedResponse(m) => Self::UnexpectedResponse(format!("{prefix}: {m}")),
            Self::Validation(m) => Self::Validation(format!("{prefix}: {m}")),
            Self::Config(m) => Self::Config(format!("{prefix}: {m}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_keeps_variant() {
        let err = ClipError::Api("status 500".into()).context("AI extraction failed");
        assert!(matches!(err, ClipError::Api(_)));
        assert_eq!(err.to_string(), "AI extraction failed: status 500");
    }

    #[test]
    fn test_config_display_prefix() {
        let err = ClipError::Config("GEMINI_API_KEY not set".into());
        assert_eq!(err.to_string(), "Configuration error: GEMINI_API_KEY not set");
    }
}
