//! Client construction.

use std::sync::Arc;

use super::Client;
use crate::auth::{ClientIdentity, CredentialStrategy};
use crate::config::{ClientOptions, ConfigError};
use crate::session::SessionManager;
use crate::transport::{AuthTransport, HttpTransport};
use crate::version::ApiVersion;
use crate::Result;

/// Validates inputs, wires the manager and optionally authenticates.
///
/// `build()` returns either a usable [`Client`] or exactly one error; a
/// half-initialised client is never handed out.
#[derive(Debug)]
pub struct ClientBuilder {
    strategy: CredentialStrategy,
    identity: ClientIdentity,
    options: ClientOptions,
    transport: Option<Arc<dyn AuthTransport>>,
    supported_versions: Vec<ApiVersion>,
}

impl ClientBuilder {
    pub fn new(strategy: CredentialStrategy, identity: ClientIdentity) -> Self {
        Self {
            strategy,
            identity,
            options: ClientOptions::default(),
            transport: None,
            supported_versions: Vec::new(),
        }
    }

    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Routes calls through `transport` instead of the default reqwest one.
    pub fn transport(mut self, transport: Arc<dyn AuthTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Limits version negotiation to `versions`.
    pub fn supported_versions(mut self, versions: impl IntoIterator<Item = ApiVersion>) -> Self {
        self.supported_versions = versions.into_iter().collect();
        self
    }

    pub async fn build(self) -> Result<Client> {
        self.options.validate()?;
        self.identity.validate()?;
        let strategy = self.strategy.normalized()?;

        let transport: Arc<dyn AuthTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                HttpTransport::with_timeout(self.options.timeout)
                    .map_err(|e| ConfigError::Transport(e.to_string()))?,
            ),
        };

        let validate = self.options.validate_on_build;
        let manager = SessionManager::new(strategy, self.identity, self.options, transport)
            .with_supported_versions(self.supported_versions);

        tracing::debug!(
            strategy = manager.strategy().name(),
            tenant_host = manager.strategy().tenant_host(),
            validate_on_build = validate,
            "building client"
        );

        if validate {
            manager.acquire().await?;
        }

        Ok(Client::from_manager(manager))
    }
}
