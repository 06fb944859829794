//! Response envelope shared by every platform endpoint.
//!
//! ```json
//! {"responseStatus": "FAILURE", "errors": [{"type": "INVALID_SESSION_ID", "message": "..."}]}
//! ```

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Success,
    Warning,
    Failure,
}

impl ResponseStatus {
    /// `WARNING` responses carry a usable payload.
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseStatus::Success | ResponseStatus::Warning)
    }
}

/// Error `type` reported by the platform.
///
/// Unknown values are kept verbatim in [`ApiErrorType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum ApiErrorType {
    UsernameOrPasswordIncorrect,
    NoPasswordProvided,
    PasswordChangeRequired,
    InvalidData,
    InvalidSessionId,
    InactiveUser,
    UserLockedOut,
    InsufficientAccess,
    OperationNotAllowed,
    ApiLimitExceeded,
    Other(String),
}

impl ApiErrorType {
    pub fn as_str(&self) -> &str {
        match self {
            ApiErrorType::UsernameOrPasswordIncorrect => "USERNAME_OR_PASSWORD_INCORRECT",
            ApiErrorType::NoPasswordProvided => "NO_PASSWORD_PROVIDED",
            ApiErrorType::PasswordChangeRequired => "PASSWORD_CHANGE_REQUIRED",
            ApiErrorType::InvalidData => "INVALID_DATA",
            ApiErrorType::InvalidSessionId => "INVALID_SESSION_ID",
            ApiErrorType::InactiveUser => "INACTIVE_USER",
            ApiErrorType::UserLockedOut => "USER_LOCKED_OUT",
            ApiErrorType::InsufficientAccess => "INSUFFICIENT_ACCESS",
            ApiErrorType::OperationNotAllowed => "OPERATION_NOT_ALLOWED",
            ApiErrorType::ApiLimitExceeded => "API_LIMIT_EXCEEDED",
            ApiErrorType::Other(s) => s,
        }
    }
}

impl From<&str> for ApiErrorType {
    fn from(s: &str) -> Self {
        match s {
            "USERNAME_OR_PASSWORD_INCORRECT" => ApiErrorType::UsernameOrPasswordIncorrect,
            "NO_PASSWORD_PROVIDED" => ApiErrorType::NoPasswordProvided,
            "PASSWORD_CHANGE_REQUIRED" => ApiErrorType::PasswordChangeRequired,
            "INVALID_DATA" => ApiErrorType::InvalidData,
            "INVALID_SESSION_ID" => ApiErrorType::InvalidSessionId,
            "INACTIVE_USER" => ApiErrorType::InactiveUser,
            "USER_LOCKED_OUT" => ApiErrorType::UserLockedOut,
            "INSUFFICIENT_ACCESS" => ApiErrorType::InsufficientAccess,
            "OPERATION_NOT_ALLOWED" => ApiErrorType::OperationNotAllowed,
            "API_LIMIT_EXCEEDED" => ApiErrorType::ApiLimitExceeded,
            other => ApiErrorType::Other(other.to_string()),
        }
    }
}

impl From<String> for ApiErrorType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl std::fmt::Display for ApiErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type")]
    pub error_type: ApiErrorType,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    response_status: ResponseStatus,
    #[serde(default)]
    errors: Vec<ApiError>,
    #[serde(default)]
    response_message: Option<String>,
}

/// Parsed envelope plus the full body for payload extraction.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub status: ResponseStatus,
    pub errors: Vec<ApiError>,
    pub message: Option<String>,
    pub payload: Value,
}

impl Envelope {
    /// Returns `None` when the body does not carry a `responseStatus`.
    pub fn parse(body: &Value) -> Option<Self> {
        let raw = RawEnvelope::deserialize(body).ok()?;
        Some(Self {
            status: raw.response_status,
            errors: raw.errors,
            message: raw.response_message,
            payload: body.clone(),
        })
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn first_error(&self) -> Option<&ApiError> {
        self.errors.first()
    }

    /// Human-readable summary of the failure.
    pub fn describe(&self) -> String {
        match self.first_error() {
            Some(e) if e.message.is_empty() => e.error_type.to_string(),
            Some(e) => format!("{}: {}", e.error_type, e.message),
            None => self
                .message
                .clone()
                .unwrap_or_else(|| "request failed without error details".into()),
        }
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_success() {
        let body = json!({"responseStatus": "SUCCESS", "sessionId": "abc"});
        let env = Envelope::parse(&body).unwrap();
        assert!(env.is_success());
        assert_eq!(env.str_field("sessionId"), Some("abc"));
    }

    #[test]
    fn test_warning_counts_as_success() {
        let body = json!({"responseStatus": "WARNING", "sessionId": "abc"});
        assert!(Envelope::parse(&body).unwrap().is_success());
    }

    #[test]
    fn test_parse_failure_with_known_and_unknown_types() {
        let body = json!({
            "responseStatus": "FAILURE",
            "errors": [
                {"type": "INVALID_SESSION_ID", "message": "Invalid or expired session ID."},
                {"type": "SOMETHING_NEW", "message": "future error"}
            ]
        });
        let env = Envelope::parse(&body).unwrap();
        assert!(!env.is_success());
        assert_eq!(env.errors[0].error_type, ApiErrorType::InvalidSessionId);
        assert_eq!(
            env.errors[1].error_type,
            ApiErrorType::Other("SOMETHING_NEW".into())
        );
        assert_eq!(
            env.describe(),
            "INVALID_SESSION_ID: Invalid or expired session ID."
        );
    }

    #[test]
    fn test_missing_status_is_not_an_envelope() {
        assert!(Envelope::parse(&json!({"sessionId": "abc"})).is_none());
        assert!(Envelope::parse(&json!({"responseStatus": "MAYBE"})).is_none());
        assert!(Envelope::parse(&Value::Null).is_none());
    }

    #[test]
    fn test_empty_field_is_absent() {
        let env = Envelope::parse(&json!({"responseStatus": "SUCCESS", "sessionId": ""})).unwrap();
        assert_eq!(env.str_field("sessionId"), None);
    }
}
