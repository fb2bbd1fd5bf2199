use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static QUOTA_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)insufficient_quota|billing|quota").expect("quota pattern is valid")
});

static RATE_LIMIT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)rate[_ -]?limit").expect("rate limit pattern is valid"));

/// Whether an error payload talks about an exhausted quota or billing problem.
pub fn mentions_quota(text: &str) -> bool {
    QUOTA_PATTERN.is_match(text)
}

/// Whether an error payload talks about rate limiting.
pub fn mentions_rate_limit(text: &str) -> bool {
    RATE_LIMIT_PATTERN.is_match(text)
}

/// Fixed user-facing messages.
pub mod messages {
    pub const MIC_DENIED: &str =
        "Microphone access was denied. Allow microphone access in your browser or system settings and try again.";
    pub const MIC_ERROR: &str = "We couldn't start your microphone. Check that one is connected and try again.";
    pub const NETWORK: &str =
        "We couldn't reach the voice service. Check your internet connection and try again.";
    pub const SESSION_GENERIC: &str = "We couldn't start the call. Please try again.";
    pub const CONNECTION: &str = "We couldn't connect the call. Please try again.";
    pub const QUOTA_EXCEEDED: &str =
        "Voice calls are unavailable right now because the usage limit has been reached.";
    pub const RATE_LIMITED: &str = "Too many calls right now. Please wait a moment and try again.";
    pub const UNAVAILABLE: &str =
        "The voice service is temporarily unavailable. Please try again later.";
    pub const PROTOCOL: &str = "Something went wrong during the call. Please try again.";
}

/// Classified error code exposed to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallErrorCode {
    MicDenied,
    MicError,
    SessionError,
    ConnectionError,
    QuotaExceeded,
    RateLimited,
    Unavailable,
    ProtocolError,
}

impl CallErrorCode {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MicDenied => "mic_denied",
            Self::MicError => "mic_error",
            Self::SessionError => "session_error",
            Self::ConnectionError => "connection_error",
            Self::QuotaExceeded => "quota_exceeded",
            Self::RateLimited => "rate_limited",
            Self::Unavailable => "unavailable",
            Self::ProtocolError => "protocol_error",
        }
    }

    /// Whether the UI should offer a retry affordance.
    ///
    /// An exhausted quota will not recover by dialing again, everything else might.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::QuotaExceeded)
    }

    /// Fixed message for codes that always use the same wording.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::MicDenied => messages::MIC_DENIED,
            Self::MicError => messages::MIC_ERROR,
            Self::SessionError => messages::SESSION_GENERIC,
            Self::ConnectionError => messages::CONNECTION,
            Self::QuotaExceeded => messages::QUOTA_EXCEEDED,
            Self::RateLimited => messages::RATE_LIMITED,
            Self::Unavailable => messages::UNAVAILABLE,
            Self::ProtocolError => messages::PROTOCOL,
        }
    }
}

impl fmt::Display for CallErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error a UI sees after a failed or aborted call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFailure {
    pub code: CallErrorCode,
    pub message: String,
}

impl CallFailure {
    pub fn new(code: CallErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Failure carrying the code's fixed message.
    pub fn from_code(code: CallErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    #[inline]
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl CallFailure {
    /// Classify a protocol-level error that arrived mid-call.
    pub fn from_protocol_error(code: &str, message: &str) -> Self {
        let haystack = format!("{code} {message}");
        if mentions_quota(&haystack) {
            Self::from_code(CallErrorCode::QuotaExceeded)
        } else if mentions_rate_limit(&haystack) {
            Self::from_code(CallErrorCode::RateLimited)
        } else {
            Self::from_code(CallErrorCode::ProtocolError)
        }
    }
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CallFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_strings() {
        assert_eq!(CallErrorCode::MicDenied.as_str(), "mic_denied");
        assert_eq!(CallErrorCode::QuotaExceeded.to_string(), "quota_exceeded");
        assert_eq!(
            serde_json::to_string(&CallErrorCode::RateLimited).unwrap(),
            "\"rate_limited\""
        );
    }

    #[test]
    fn test_only_quota_is_not_retryable() {
        assert!(!CallErrorCode::QuotaExceeded.is_retryable());
        assert!(CallErrorCode::RateLimited.is_retryable());
        assert!(CallErrorCode::MicDenied.is_retryable());
        assert!(CallErrorCode::ProtocolError.is_retryable());
    }

    #[test]
    fn test_patterns() {
        assert!(mentions_quota("You exceeded your current quota"));
        assert!(mentions_quota("INSUFFICIENT_QUOTA"));
        assert!(mentions_quota("check your billing details"));
        assert!(mentions_rate_limit("rate_limit_exceeded"));
        assert!(mentions_rate_limit("Rate limit reached"));
        assert!(!mentions_rate_limit("server overloaded"));
    }

    #[test]
    fn test_protocol_error_classification() {
        assert_eq!(
            CallFailure::from_protocol_error("insufficient_quota", "").code,
            CallErrorCode::QuotaExceeded
        );
        assert_eq!(
            CallFailure::from_protocol_error("rate_limit_exceeded", "slow down").code,
            CallErrorCode::RateLimited
        );
        let generic = CallFailure::from_protocol_error("invalid_value", "bad tool schema");
        assert_eq!(generic.code, CallErrorCode::ProtocolError);
        assert_eq!(generic.message, messages::PROTOCOL);
    }

    #[test]
    fn test_from_code_uses_fixed_message() {
        let failure = CallFailure::from_code(CallErrorCode::QuotaExceeded);
        assert_eq!(failure.message, messages::QUOTA_EXCEEDED);
        assert!(!failure.is_retryable());
    }
}
