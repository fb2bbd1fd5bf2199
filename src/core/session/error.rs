use thiserror::Error;

use crate::errors::{CallErrorCode, CallFailure, mentions_quota, mentions_rate_limit, messages};

/// Errors produced while minting a session token.
#[derive(Debug, Error)]
pub enum SessionTokenError {
    /// The request never got an HTTP response
    #[error("Network error: {0}")]
    Network(String),

    /// The endpoint answered with a non-success status
    #[error("Session API error ({status}, {code}): {message}")]
    Api {
        status: u16,
        code: CallErrorCode,
        message: String,
    },

    /// The endpoint answered 2xx with a body we could not use
    #[error("Invalid session response: {0}")]
    InvalidResponse(String),

    #[error("Session client configuration error: {0}")]
    Configuration(String),
}

impl SessionTokenError {
    pub fn code(&self) -> CallErrorCode {
        match self {
            Self::Api { code, .. } => *code,
            _ => CallErrorCode::SessionError,
        }
    }
}

impl From<SessionTokenError> for CallFailure {
    fn from(err: SessionTokenError) -> Self {
        match err {
            SessionTokenError::Network(_) => {
                CallFailure::new(CallErrorCode::SessionError, messages::NETWORK)
            }
            SessionTokenError::Api { code, message, .. } => CallFailure::new(code, message),
            SessionTokenError::InvalidResponse(_) | SessionTokenError::Configuration(_) => {
                CallFailure::from_code(CallErrorCode::SessionError)
            }
        }
    }
}

/// Classify a non-success session response.
///
/// The body is expected to look like `{ "error": string, "code"?: string }`,
/// but OpenAI-style `{ "error": { "message", "code", "type" } }` bodies and
/// plain text are accepted too. Quota wording wins over rate limiting so a 429
/// caused by an exhausted quota is reported as such.
pub fn classify_api_failure(status: u16, body: &str) -> SessionTokenError {
    let server_message = extract_message(body);

    let code = if mentions_quota(body) {
        CallErrorCode::QuotaExceeded
    } else if status == 429 || mentions_rate_limit(body) {
        CallErrorCode::RateLimited
    } else if status >= 500 {
        CallErrorCode::Unavailable
    } else {
        CallErrorCode::SessionError
    };

    let message = match code {
        CallErrorCode::SessionError => server_message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| messages::SESSION_GENERIC.to_string()),
        other => other.default_message().to_string(),
    };

    SessionTokenError::Api {
        status,
        code,
        message,
    }
}

fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(obj) => obj
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_of(err: &SessionTokenError) -> CallErrorCode {
        err.code()
    }

    #[test]
    fn test_429_with_insufficient_quota() {
        let err = classify_api_failure(
            429,
            r#"{"error":"You exceeded your current quota","code":"insufficient_quota"}"#,
        );
        let failure: CallFailure = err.into();
        assert_eq!(failure.code, CallErrorCode::QuotaExceeded);
        assert_eq!(failure.message, messages::QUOTA_EXCEEDED);
        assert_ne!(failure.message, messages::UNAVAILABLE);
    }

    #[test]
    fn test_429_without_quota_is_rate_limited() {
        let err = classify_api_failure(429, r#"{"error":"Too many requests"}"#);
        assert_eq!(code_of(&err), CallErrorCode::RateLimited);
    }

    #[test]
    fn test_rate_limit_code_on_other_status() {
        let err = classify_api_failure(400, r#"{"error":"slow","code":"rate_limit_exceeded"}"#);
        assert_eq!(code_of(&err), CallErrorCode::RateLimited);
    }

    #[test]
    fn test_billing_on_other_status() {
        let err = classify_api_failure(403, r#"{"error":"Billing hard limit reached"}"#);
        assert_eq!(code_of(&err), CallErrorCode::QuotaExceeded);
    }

    #[test]
    fn test_server_error_is_unavailable() {
        let failure: CallFailure = classify_api_failure(503, "upstream down").into();
        assert_eq!(failure.code, CallErrorCode::Unavailable);
        assert_eq!(failure.message, messages::UNAVAILABLE);
    }

    #[test]
    fn test_client_error_uses_server_message() {
        let failure: CallFailure =
            classify_api_failure(400, r#"{"error":"Unknown voice 'robot'"}"#).into();
        assert_eq!(failure.code, CallErrorCode::SessionError);
        assert_eq!(failure.message, "Unknown voice 'robot'");
    }

    #[test]
    fn test_nested_error_object_message() {
        let failure: CallFailure = classify_api_failure(
            401,
            r#"{"error":{"message":"Invalid API key","type":"invalid_request_error"}}"#,
        )
        .into();
        assert_eq!(failure.message, "Invalid API key");
    }

    #[test]
    fn test_client_error_without_body_is_generic() {
        let failure: CallFailure = classify_api_failure(404, "").into();
        assert_eq!(failure.code, CallErrorCode::SessionError);
        assert_eq!(failure.message, messages::SESSION_GENERIC);
    }

    #[test]
    fn test_network_error_message() {
        let failure: CallFailure = SessionTokenError::Network("dns".to_string()).into();
        assert_eq!(failure.code, CallErrorCode::SessionError);
        assert_eq!(failure.message, messages::NETWORK);
    }
}
