//! Error taxonomy shared by every provider strategy.

/// Substring that upstream providers put in free-text errors when the
/// account balance is used up. Matched case-sensitively.
pub const QUOTA_EXHAUSTED_MARKER: &str = "Exhausted balance";

/// Keywords that indicate a content policy rejection in error messages.
const CONTENT_POLICY_KEYWORDS: &[&str] = &[
    "content policy",
    "policy violation",
    "inappropriate",
    "not allowed",
    "prohibited",
    "blocked",
    "unsafe",
    "violates",
    "moderation",
    "nsfw",
];

/// Check if an upstream message reports an exhausted balance.
pub fn is_quota_message(message: &str) -> bool {
    message.contains(QUOTA_EXHAUSTED_MARKER)
}

/// Check if an error message indicates a content policy violation.
pub fn is_content_policy_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    CONTENT_POLICY_KEYWORDS
        .iter()
        .any(|keyword| lower.contains(keyword))
}

/// Terminal failure of a generation request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("Provider quota exhausted: {message}")]
    QuotaExhausted {
        /// Message as reported by the provider
        message: String,
    },

    #[error("Provider unavailable: {message}")]
    ProviderUnavailable {
        /// HTTP status, when a response was received at all
        status: Option<u16>,
        /// Human-readable failure description
        message: String,
    },

    #[error("Generation timed out after {attempts} status checks")]
    Timeout {
        /// Number of status checks made before giving up
        attempts: u32,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unexpected failure: {0}")]
    Unknown(String),
}

impl GenerationError {
    /// Build an unavailable error for a failure where no response arrived.
    pub fn unavailable(message: impl Into<String>) -> Self {
        GenerationError::ProviderUnavailable {
            status: None,
            message: message.into(),
        }
    }

    /// Classify the reason a job reported for failing.
    ///
    /// Quota exhaustion is recognised by substring; every other job failure
    /// means the provider could not deliver.
    pub fn from_job_failure(reason: &str) -> Self {
        if is_quota_message(reason) {
            GenerationError::QuotaExhausted {
                message: reason.to_string(),
            }
        } else {
            GenerationError::ProviderUnavailable {
                status: None,
                message: format!("Generation failed: {}", reason),
            }
        }
    }

    /// Whether the caller should suggest switching to another engine.
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, GenerationError::QuotaExhausted { .. })
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(error: reqwest::Error) -> Self {
        GenerationError::ProviderUnavailable {
            status: error.status().map(|s| s.as_u16()),
            message: error.to_string(),
        }
    }
}

impl From<std::io::Error> for GenerationError {
    fn from(error: std::io::Error) -> Self {
        GenerationError::Unknown(format!("IO error: {}", error))
    }
}

impl From<serde_json::Error> for GenerationError {
    fn from(error: serde_json::Error) -> Self {
        GenerationError::Unknown(format!("Malformed provider response: {}", error))
    }
}
