//! Session data.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::version::ApiVersion;

/// A live, authenticated session on one tenant.
///
/// Always carries a non-empty token and tenant host; an unauthenticated
/// client simply holds no `Session`.
#[derive(Clone)]
pub struct Session {
    token: SecretString,
    tenant_host: String,
    api_version: ApiVersion,
    user_id: Option<String>,
    issued_at: DateTime<Utc>,
    last_validated_at: DateTime<Utc>,
    delegator_user_id: Option<String>,
}

impl Session {
    /// Returns `None` if `token` or `tenant_host` is empty.
    pub fn new(
        token: impl Into<String>,
        tenant_host: impl Into<String>,
        api_version: ApiVersion,
    ) -> Option<Self> {
        let token = token.into();
        let tenant_host = tenant_host.into();
        if token.is_empty() || tenant_host.is_empty() {
            return None;
        }
        let now = Utc::now();
        Some(Self {
            token: SecretString::from(token),
            tenant_host,
            api_version,
            user_id: None,
            issued_at: now,
            last_validated_at: now,
            delegator_user_id: None,
        })
    }

    pub(crate) fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Marks the session as acting for `delegator_user_id`.
    pub(crate) fn delegated_for(mut self, delegator_user_id: impl Into<String>) -> Self {
        self.delegator_user_id = Some(delegator_user_id.into());
        self
    }

    pub(crate) fn with_api_version(mut self, api_version: ApiVersion) -> Self {
        self.api_version = api_version;
        self
    }

    /// Same token, fresh validation timestamp.
    pub(crate) fn touched(&self, at: DateTime<Utc>) -> Self {
        Self {
            last_validated_at: at,
            ..self.clone()
        }
    }

    #[cfg(test)]
    pub(crate) fn validated_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_validated_at = at;
        self
    }

    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    pub fn tenant_host(&self) -> &str {
        &self.tenant_host
    }

    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn last_validated_at(&self) -> DateTime<Utc> {
        self.last_validated_at
    }

    pub fn is_delegated(&self) -> bool {
        self.delegator_user_id.is_some()
    }

    pub fn delegator_user_id(&self) -> Option<&str> {
        self.delegator_user_id.as_deref()
    }

    /// Seconds since the last successful validation or keep-alive.
    pub fn age_since_validation(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_validated_at
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("tenant_host", &self.tenant_host)
            .field("api_version", &self.api_version)
            .field("issued_at", &self.issued_at)
            .field("last_validated_at", &self.last_validated_at)
            .field("delegator_user_id", &self.delegator_user_id)
            .finish()
    }
}

/// A tenant/user the current identity may act on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DelegationGrant {
    #[serde(rename = "id", deserialize_with = "string_or_number")]
    pub tenant_id: String,
    #[serde(rename = "name", default)]
    pub tenant_name: Option<String>,
    #[serde(rename = "dns", default)]
    pub tenant_host: Option<String>,
    #[serde(rename = "delegator_userid", deserialize_with = "string_or_number")]
    pub delegator_user_id: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// Delegation lifecycle of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelegationState {
    /// Acting as the authenticated identity.
    #[default]
    Direct,
    /// Acting on behalf of a delegator.
    Delegated,
    /// Access was withdrawn, from the identity or by the delegator; terminal.
    Revoked,
}
