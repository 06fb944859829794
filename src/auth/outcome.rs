//! Authentication results and failure taxonomy.

use std::time::Duration;

use crate::session::Session;
use crate::transport::ApiErrorType;

/// Why an authentication-related call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    /// A required credential field was empty. Always raised locally.
    MissingField,
    InvalidCredentials,
    SessionExpired,
    SessionRevoked,
    DelegationNotPermitted,
    RateLimited,
    Timeout,
    TransportFailure,
    UnexpectedResponseShape,
}

impl AuthErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthErrorKind::MissingField => "missing_field",
            AuthErrorKind::InvalidCredentials => "invalid_credentials",
            AuthErrorKind::SessionExpired => "session_expired",
            AuthErrorKind::SessionRevoked => "session_revoked",
            AuthErrorKind::DelegationNotPermitted => "delegation_not_permitted",
            AuthErrorKind::RateLimited => "rate_limited",
            AuthErrorKind::Timeout => "timeout",
            AuthErrorKind::TransportFailure => "transport_failure",
            AuthErrorKind::UnexpectedResponseShape => "unexpected_response_shape",
        }
    }

    /// Never retried automatically for the current strategy.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuthErrorKind::MissingField
                | AuthErrorKind::InvalidCredentials
                | AuthErrorKind::SessionRevoked
                | AuthErrorKind::DelegationNotPermitted
        )
    }

    /// Retried with backoff on idempotent calls.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthErrorKind::RateLimited | AuthErrorKind::TransportFailure
        )
    }
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure returned by the session manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct AuthFailure {
    pub kind: AuthErrorKind,
    pub message: String,
    /// Platform error type, when the failure came from a response envelope.
    pub error_type: Option<ApiErrorType>,
    /// Server-requested wait before retrying.
    pub retry_after: Option<Duration>,
}

impl AuthFailure {
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            error_type: None,
            retry_after: None,
        }
    }

    pub fn with_error_type(mut self, error_type: ApiErrorType) -> Self {
        self.error_type = Some(error_type);
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            AuthErrorKind::Timeout,
            format!("no response within {:.1}s", after.as_secs_f64()),
        )
    }

    pub fn no_session() -> Self {
        Self::new(AuthErrorKind::SessionExpired, "client holds no active session")
    }

    /// Terminal: the client has to be rebuilt.
    pub fn revoked() -> Self {
        Self::new(AuthErrorKind::SessionRevoked, "access was revoked; build a new client")
    }

    pub fn unexpected_shape(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::UnexpectedResponseShape, message)
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// `Success(Session)` or `Failure(kind, message)`.
pub type AuthOutcome = std::result::Result<Session, AuthFailure>;
