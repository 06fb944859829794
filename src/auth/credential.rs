//! Credential strategies.

use secrecy::{ExposeSecret, SecretString};

use crate::config::ConfigError;

/// One way of obtaining a tenant session.
///
/// Secrets are held in [`SecretString`] so `Debug` output never leaks them.
#[derive(Clone, Debug)]
pub enum CredentialStrategy {
    /// Username/password login against the tenant.
    Basic {
        tenant_host: String,
        username: String,
        password: SecretString,
    },
    /// Reuse of an existing session token. Single-shot: it cannot be renewed.
    SessionToken {
        tenant_host: String,
        token: SecretString,
    },
    /// Exchange of an identity-provider access token for a tenant session.
    OAuthAccessToken {
        tenant_host: String,
        oauth_profile_id: String,
        oauth_client_id: String,
        identity_provider_access_token: SecretString,
    },
    /// Discover the identity provider for a profile, log in there, then exchange.
    OAuthDiscovery {
        tenant_host: String,
        oauth_profile_id: String,
        oauth_client_id: String,
        identity_provider_username: Option<String>,
        identity_provider_password: SecretString,
    },
}

impl CredentialStrategy {
    pub fn basic(
        tenant_host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::Basic {
            tenant_host: tenant_host.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn session_token(tenant_host: impl Into<String>, token: impl Into<String>) -> Self {
        Self::SessionToken {
            tenant_host: tenant_host.into(),
            token: SecretString::from(token.into()),
        }
    }

    pub fn oauth_access_token(
        tenant_host: impl Into<String>,
        oauth_profile_id: impl Into<String>,
        oauth_client_id: impl Into<String>,
        identity_provider_access_token: impl Into<String>,
    ) -> Self {
        Self::OAuthAccessToken {
            tenant_host: tenant_host.into(),
            oauth_profile_id: oauth_profile_id.into(),
            oauth_client_id: oauth_client_id.into(),
            identity_provider_access_token: SecretString::from(
                identity_provider_access_token.into(),
            ),
        }
    }

    pub fn oauth_discovery(
        tenant_host: impl Into<String>,
        oauth_profile_id: impl Into<String>,
        oauth_client_id: impl Into<String>,
        identity_provider_username: Option<String>,
        identity_provider_password: impl Into<String>,
    ) -> Self {
        Self::OAuthDiscovery {
            tenant_host: tenant_host.into(),
            oauth_profile_id: oauth_profile_id.into(),
            oauth_client_id: oauth_client_id.into(),
            identity_provider_username,
            identity_provider_password: SecretString::from(identity_provider_password.into()),
        }
    }

    /// Strategy name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            CredentialStrategy::Basic { .. } => "basic",
            CredentialStrategy::SessionToken { .. } => "session_token",
            CredentialStrategy::OAuthAccessToken { .. } => "oauth_access_token",
            CredentialStrategy::OAuthDiscovery { .. } => "oauth_discovery",
        }
    }

    pub fn tenant_host(&self) -> &str {
        match self {
            CredentialStrategy::Basic { tenant_host, .. }
            | CredentialStrategy::SessionToken { tenant_host, .. }
            | CredentialStrategy::OAuthAccessToken { tenant_host, .. }
            | CredentialStrategy::OAuthDiscovery { tenant_host, .. } => tenant_host,
        }
    }

    /// Whether the strategy can silently log in again after the session dies.
    pub fn retains_credentials(&self) -> bool {
        matches!(
            self,
            CredentialStrategy::Basic { .. } | CredentialStrategy::OAuthDiscovery { .. }
        )
    }

    /// Checks every required field of the populated variant, in declaration order.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("tenantHost", self.tenant_host())?;
        match self {
            CredentialStrategy::Basic {
                username, password, ..
            } => {
                require("username", username)?;
                require("password", password.expose_secret())
            }
            CredentialStrategy::SessionToken { token, .. } => {
                require("token", token.expose_secret())
            }
            CredentialStrategy::OAuthAccessToken {
                oauth_profile_id,
                oauth_client_id,
                identity_provider_access_token,
                ..
            } => {
                require("oauthProfileId", oauth_profile_id)?;
                require("oauthClientId", oauth_client_id)?;
                require(
                    "identityProviderAccessToken",
                    identity_provider_access_token.expose_secret(),
                )
            }
            CredentialStrategy::OAuthDiscovery {
                oauth_profile_id,
                oauth_client_id,
                identity_provider_username,
                identity_provider_password,
                ..
            } => {
                require("oauthProfileId", oauth_profile_id)?;
                require("oauthClientId", oauth_client_id)?;
                if let Some(username) = identity_provider_username {
                    require("identityProviderUsername", username)?;
                }
                require(
                    "identityProviderPassword",
                    identity_provider_password.expose_secret(),
                )
            }
        }
    }

    /// Validates, then rewrites the tenant host to its bare `host[:port]` form.
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        self.validate()?;
        let host = normalize_tenant_host(self.tenant_host())?;
        match &mut self {
            CredentialStrategy::Basic { tenant_host, .. }
            | CredentialStrategy::SessionToken { tenant_host, .. }
            | CredentialStrategy::OAuthAccessToken { tenant_host, .. }
            | CredentialStrategy::OAuthDiscovery { tenant_host, .. } => *tenant_host = host,
        }
        Ok(self)
    }
}

fn require(name: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::MissingField(name))
    } else {
        Ok(())
    }
}

/// Strips scheme, path and trailing slashes: `https://acme.example.com/` → `acme.example.com`.
pub fn normalize_tenant_host(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::MissingField("tenantHost"));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = url::Url::parse(&with_scheme)
        .map_err(|e| ConfigError::InvalidTenantHost(format!("{}: {}", raw, e)))?;
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ConfigError::InvalidTenantHost(raw.to_string()))?;

    Ok(match url.port() {
        Some(port) => format!("{}:{}", host.to_ascii_lowercase(), port),
        None => host.to_ascii_lowercase(),
    })
}
