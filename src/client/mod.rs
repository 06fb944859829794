//! Client façade handed to domain-request code.
//!
//! A [`Client`] is bound to one tenant and one identity. Domain requests ask
//! it for the current token and API version, and call
//! [`ensure_valid`](Client::ensure_valid) before issuing work after idle
//! periods.

mod builder;
pub mod resilience;

pub use builder::ClientBuilder;
pub use resilience::{ExponentialBackoff, RetryConfig};

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthFailure, AuthOutcome, ClientIdentity, CredentialStrategy};
use crate::config::ClientOptions;
use crate::session::{DelegationGrant, DelegationState, Session, SessionManager};
use crate::transport::{AUTHORIZATION_HEADER, CLIENT_ID_HEADER};
use crate::version::ApiVersion;
use crate::Result;

/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct Client {
    manager: Arc<SessionManager>,
}

impl Client {
    pub fn builder(strategy: CredentialStrategy, identity: ClientIdentity) -> ClientBuilder {
        ClientBuilder::new(strategy, identity)
    }

    /// Builds with the default transport.
    pub async fn build(
        strategy: CredentialStrategy,
        identity: ClientIdentity,
        options: ClientOptions,
    ) -> Result<Self> {
        ClientBuilder::new(strategy, identity)
            .options(options)
            .build()
            .await
    }

    pub(crate) fn from_manager(manager: SessionManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.manager.current()
    }

    pub fn current_token(&self) -> Option<String> {
        self.session().map(|s| s.token().to_string())
    }

    /// Version of the active session, or the bootstrap version when there is none.
    pub fn api_version(&self) -> ApiVersion {
        self.session()
            .map(|s| s.api_version())
            .unwrap_or_else(|| self.manager.bootstrap_version())
    }

    /// `/api/{version}/{suffix}`, with `version` overriding the negotiated one.
    pub fn api_path(&self, version: Option<ApiVersion>, suffix: &str) -> String {
        version.unwrap_or_else(|| self.api_version()).api_path(suffix)
    }

    /// Host of the active session; differs from the configured one once delegated.
    pub fn tenant_host(&self) -> String {
        match self.session() {
            Some(session) => session.tenant_host().to_string(),
            None => self.manager.strategy().tenant_host().to_string(),
        }
    }

    pub fn is_delegated(&self) -> bool {
        self.session().is_some_and(|s| s.is_delegated())
    }

    pub fn delegation_state(&self) -> DelegationState {
        self.manager.state()
    }

    pub fn identity(&self) -> &ClientIdentity {
        self.manager.identity()
    }

    pub fn options(&self) -> &ClientOptions {
        self.manager.options()
    }

    /// Headers a domain request attaches: client id always, token when authenticated.
    pub fn authorization_headers(&self) -> Vec<(&'static str, String)> {
        let snapshot = self.manager.snapshot();
        let mut headers = vec![(CLIENT_ID_HEADER, self.manager.client_id().to_string())];
        if let Some(session) = &snapshot.session {
            headers.push((AUTHORIZATION_HEADER, session.token().to_string()));
        }
        headers
    }

    /// Re-validates sessions older than `options.validation_interval`.
    pub async fn ensure_valid(&self) -> AuthOutcome {
        self.manager
            .ensure_valid(self.options().validation_interval)
            .await
    }

    pub async fn ensure_valid_within(&self, max_age: Duration) -> AuthOutcome {
        self.manager.ensure_valid(max_age).await
    }

    pub async fn validate(&self) -> bool {
        self.manager.validate().await
    }

    pub async fn keep_alive(&self) -> AuthOutcome {
        self.manager.keep_alive().await
    }

    /// Runs the strategy again and replaces the session.
    pub async fn reauthenticate(&self) -> AuthOutcome {
        self.manager.acquire().await
    }

    pub async fn list_versions(&self) -> std::result::Result<Vec<ApiVersion>, AuthFailure> {
        self.manager.list_versions().await
    }

    pub async fn list_delegations(&self) -> std::result::Result<Vec<DelegationGrant>, AuthFailure> {
        self.manager.list_delegations().await
    }

    pub async fn initiate_delegated_session(
        &self,
        tenant_id: &str,
        delegator_user_id: &str,
    ) -> AuthOutcome {
        self.manager
            .initiate_delegated_session(tenant_id, delegator_user_id)
            .await
    }

    pub async fn initiate_delegated_session_with(&self, grant: &DelegationGrant) -> AuthOutcome {
        self.manager.initiate_delegated_session_with(grant).await
    }

    pub async fn end_session(&self) -> std::result::Result<(), AuthFailure> {
        self.manager.end_session().await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("strategy", &self.manager.strategy().name())
            .field("tenant_host", &self.tenant_host())
            .field("authenticated", &self.session().is_some())
            .field("delegation_state", &self.delegation_state())
            .finish()
    }
}
