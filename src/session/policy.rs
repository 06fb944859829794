//! Maps raw responses to envelopes or classified failures.
//!
//! `responseStatus` in the body wins over the HTTP status code. Only bodies
//! without an envelope fall back to status-code rules.

use std::time::Duration;

use crate::auth::{AuthErrorKind, AuthFailure};
use crate::transport::{ApiErrorType, Envelope, TransportError, TransportResponse};

/// Which kind of call produced the response; decides how failures read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    /// Authentication, OAuth exchange, discovery.
    Acquire,
    /// Validation, keep-alive, version listing, logout.
    Session,
    /// Delegation listing and login.
    Delegation,
}

pub fn interpret(response: TransportResponse, call: Call) -> Result<Envelope, AuthFailure> {
    match Envelope::parse(&response.json) {
        Some(envelope) if envelope.is_success() => Ok(envelope),
        Some(envelope) => Err(from_envelope(&envelope, call)),
        None => Err(from_status(&response, call)),
    }
}

pub fn from_transport(error: TransportError, deadline: Duration) -> AuthFailure {
    match error {
        TransportError::Timeout => AuthFailure::timeout(deadline),
        TransportError::Connect(message) | TransportError::Io(message) => {
            AuthFailure::new(AuthErrorKind::TransportFailure, message)
        }
    }
}

fn from_envelope(envelope: &Envelope, call: Call) -> AuthFailure {
    let error_type = envelope.first_error().map(|e| e.error_type.clone());
    let kind = match &error_type {
        Some(t) => kind_for(t, call),
        None => default_kind(call),
    };

    let failure = AuthFailure::new(kind, envelope.describe());
    match error_type {
        Some(t) => failure.with_error_type(t),
        None => failure,
    }
}

fn kind_for(error_type: &ApiErrorType, call: Call) -> AuthErrorKind {
    use ApiErrorType::*;

    match (error_type, call) {
        (ApiLimitExceeded, _) => AuthErrorKind::RateLimited,
        (InactiveUser | UserLockedOut, _) => AuthErrorKind::SessionRevoked,
        (_, Call::Acquire) => AuthErrorKind::InvalidCredentials,
        (InvalidSessionId, _) => AuthErrorKind::SessionExpired,
        (InsufficientAccess | OperationNotAllowed, Call::Delegation) => {
            AuthErrorKind::DelegationNotPermitted
        }
        (InsufficientAccess, _) => AuthErrorKind::SessionRevoked,
        _ => default_kind(call),
    }
}

fn default_kind(call: Call) -> AuthErrorKind {
    match call {
        Call::Acquire => AuthErrorKind::InvalidCredentials,
        Call::Session => AuthErrorKind::SessionExpired,
        Call::Delegation => AuthErrorKind::DelegationNotPermitted,
    }
}

fn from_status(response: &TransportResponse, call: Call) -> AuthFailure {
    let status = response.status;
    match status {
        429 => {
            let failure =
                AuthFailure::new(AuthErrorKind::RateLimited, "HTTP 429 Too Many Requests");
            match retry_after(response) {
                Some(after) => failure.with_retry_after(after),
                None => failure,
            }
        }
        500..=599 => AuthFailure::new(
            AuthErrorKind::TransportFailure,
            format!("HTTP {} without response envelope", status),
        ),
        401 => AuthFailure::new(
            match call {
                Call::Acquire => AuthErrorKind::InvalidCredentials,
                _ => AuthErrorKind::SessionExpired,
            },
            "HTTP 401 Unauthorized",
        ),
        403 => AuthFailure::new(
            match call {
                Call::Acquire => AuthErrorKind::InvalidCredentials,
                Call::Session => AuthErrorKind::SessionRevoked,
                Call::Delegation => AuthErrorKind::DelegationNotPermitted,
            },
            "HTTP 403 Forbidden",
        ),
        _ => AuthFailure::unexpected_shape(format!(
            "HTTP {} response without responseStatus",
            status
        )),
    }
}

fn retry_after(response: &TransportResponse) -> Option<Duration> {
    response
        .header("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
