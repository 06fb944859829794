//! Session lifecycle: acquisition, validation, keep-alive and delegation.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;

use super::model::{DelegationGrant, DelegationState, Session};
use super::policy::{self, Call};
use super::store::{SessionStore, Snapshot, StoreWriter};
use crate::auth::{
    AuthErrorKind, AuthFailure, AuthOutcome, ClientIdentity, CredentialStrategy,
    normalize_tenant_host,
};
use crate::client::RetryConfig;
use crate::config::ClientOptions;
use crate::oauth;
use crate::transport::{
    AUTHORIZATION_HEADER, AuthTransport, CLIENT_ID_HEADER, Envelope, TransportRequest,
    TransportResponse,
};
use crate::version::{self, ApiVersion, SUPPORTED_API_VERSIONS};

const VERSIONS_PATH: &str = "/api/";
const WHO_AM_I: &str = "objects/users/me";
const KEEP_ALIVE: &str = "keep-alive";
const DELEGATIONS: &str = "delegation/vaults";
const DELEGATED_LOGIN: &str = "delegation/login";
const LOGOUT: &str = "session";

/// Owns the session of one client and every network call that changes it.
///
/// Every operation runs under `options.timeout`. Mutations happen only after
/// the last network call of an operation completes, so a deadline that fires
/// mid-operation leaves the store untouched.
#[derive(Debug)]
pub struct SessionManager {
    strategy: CredentialStrategy,
    identity: ClientIdentity,
    client_id: String,
    options: ClientOptions,
    transport: Arc<dyn AuthTransport>,
    supported: Vec<ApiVersion>,
    store: SessionStore,
    // Set once a single-shot strategy has produced its session.
    spent: AtomicBool,
}

impl SessionManager {
    pub fn new(
        strategy: CredentialStrategy,
        identity: ClientIdentity,
        options: ClientOptions,
        transport: Arc<dyn AuthTransport>,
    ) -> Self {
        let client_id = identity.client_id();
        Self {
            strategy,
            identity,
            client_id,
            options,
            transport,
            supported: SUPPORTED_API_VERSIONS.to_vec(),
            store: SessionStore::new(),
            spent: AtomicBool::new(false),
        }
    }

    /// Restricts negotiation to `versions` instead of [`SUPPORTED_API_VERSIONS`].
    pub fn with_supported_versions(mut self, versions: Vec<ApiVersion>) -> Self {
        if !versions.is_empty() {
            self.supported = versions;
        }
        self
    }

    pub fn strategy(&self) -> &CredentialStrategy {
        &self.strategy
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Value sent in the client-identity header.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        self.store.current()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.snapshot()
    }

    pub fn state(&self) -> DelegationState {
        self.store.state()
    }

    /// Obtains a fresh session from the strategy and installs it.
    pub async fn acquire(&self) -> AuthOutcome {
        self.within_deadline("acquire", async {
            let mut store = self.store.lock().await;
            self.acquire_locked(&mut store).await
        })
        .await
        .map(|session| (*session).clone())
    }

    /// Lightweight "who am I" call. Never errors; `false` means unusable.
    pub async fn validate(&self) -> bool {
        self.within_deadline("validate", async {
            let mut store = self.store.lock().await;
            let session = store.current().ok_or_else(AuthFailure::no_session)?;
            self.revalidate_locked(&mut store, &session).await
        })
        .await
        .is_ok()
    }

    /// Extends the server-side expiry without changing the token.
    ///
    /// An expired session is re-acquired when the strategy can do so.
    pub async fn keep_alive(&self) -> AuthOutcome {
        self.within_deadline("keep_alive", async {
            let mut store = self.store.lock().await;
            let Some(session) = store.current() else {
                let failure = absent(&store);
                return self.recover(&mut store, failure).await;
            };

            let request = self.authorized(
                TransportRequest::post(session.tenant_host(), session.api_version().api_path(KEEP_ALIVE)),
                &session,
            );
            match self.call("keep_alive", Call::Session, request).await {
                Ok(_) => {
                    tracing::debug!(tenant_host = session.tenant_host(), "session kept alive");
                    Ok(self.touch(&mut store, &session))
                }
                Err(failure) if failure.kind == AuthErrorKind::SessionExpired => {
                    self.recover(&mut store, failure).await
                }
                Err(failure) => {
                    self.absorb(&mut store, &failure);
                    Err(failure)
                }
            }
        })
        .await
        .map(|session| (*session).clone())
    }

    /// Validates when the session is older than `max_age`, re-acquiring at most once.
    pub async fn ensure_valid(&self, max_age: Duration) -> AuthOutcome {
        if let Some(session) = self.store.current() {
            if is_fresh(&session, max_age) {
                return Ok((*session).clone());
            }
        }

        self.within_deadline("ensure_valid", async {
            let mut store = self.store.lock().await;
            match store.current() {
                // Another task refreshed it while we waited for the lock.
                Some(session) if is_fresh(&session, max_age) => Ok(session),
                Some(session) => match self.revalidate_locked(&mut store, &session).await {
                    Err(failure) if failure.kind == AuthErrorKind::SessionExpired => {
                        self.recover(&mut store, failure).await
                    }
                    other => other,
                },
                None => {
                    let failure = absent(&store);
                    self.recover(&mut store, failure).await
                }
            }
        })
        .await
        .map(|session| (*session).clone())
    }

    /// Versions the tenant of the current session offers.
    pub async fn list_versions(&self) -> Result<Vec<ApiVersion>, AuthFailure> {
        let session = self.store.current().ok_or_else(AuthFailure::no_session)?;
        self.within_deadline(
            "list_versions",
            self.fetch_versions(session.tenant_host(), session.token()),
        )
        .await
    }

    /// Tenants and users the current identity may act on behalf of.
    pub async fn list_delegations(&self) -> Result<Vec<DelegationGrant>, AuthFailure> {
        let session = self.store.current().ok_or_else(AuthFailure::no_session)?;
        self.within_deadline("list_delegations", self.fetch_grants(&session))
            .await
    }

    /// Replaces the direct session with one acting for `delegator_user_id` on `tenant_id`.
    ///
    /// The grant is looked up first to find the delegated tenant's host.
    pub async fn initiate_delegated_session(
        &self,
        tenant_id: &str,
        delegator_user_id: &str,
    ) -> AuthOutcome {
        self.within_deadline("initiate_delegated_session", async {
            let mut store = self.store.lock().await;
            let session = delegation_source(&store)?;
            let grant = self
                .fetch_grants(&session)
                .await?
                .into_iter()
                .find(|g| g.tenant_id == tenant_id && g.delegator_user_id == delegator_user_id)
                .ok_or_else(|| {
                    AuthFailure::new(
                        AuthErrorKind::DelegationNotPermitted,
                        format!(
                            "no delegation grant for tenant {} from user {}",
                            tenant_id, delegator_user_id
                        ),
                    )
                })?;
            self.delegate_locked(&mut store, &session, &grant).await
        })
        .await
        .map(|session| (*session).clone())
    }

    /// Like [`initiate_delegated_session`](Self::initiate_delegated_session) with a grant
    /// the caller already holds.
    pub async fn initiate_delegated_session_with(&self, grant: &DelegationGrant) -> AuthOutcome {
        self.within_deadline("initiate_delegated_session", async {
            let mut store = self.store.lock().await;
            let session = delegation_source(&store)?;
            self.delegate_locked(&mut store, &session, grant).await
        })
        .await
        .map(|session| (*session).clone())
    }

    /// Logs out server-side and drops the session.
    ///
    /// A session the server already considers expired counts as ended.
    pub async fn end_session(&self) -> Result<(), AuthFailure> {
        self.within_deadline("end_session", async {
            let mut store = self.store.lock().await;
            let Some(session) = store.current() else {
                return Ok(());
            };

            let request = self.authorized(
                TransportRequest::delete(session.tenant_host(), session.api_version().api_path(LOGOUT)),
                &session,
            );
            match self.call("end_session", Call::Session, request).await {
                Err(failure) if failure.kind != AuthErrorKind::SessionExpired => {
                    self.absorb(&mut store, &failure);
                    Err(failure)
                }
                _ => {
                    store.clear();
                    tracing::info!(tenant_host = session.tenant_host(), "session ended");
                    Ok(())
                }
            }
        })
        .await
    }

    async fn acquire_locked(&self, store: &mut StoreWriter<'_>) -> Result<Arc<Session>, AuthFailure> {
        match store.state() {
            DelegationState::Direct => {}
            DelegationState::Delegated => {
                return Err(AuthFailure::new(
                    AuthErrorKind::SessionExpired,
                    "a delegated session cannot be re-acquired; build a new client",
                ));
            }
            DelegationState::Revoked => return Err(AuthFailure::revoked()),
        }

        if !self.strategy.retains_credentials() && self.spent.load(Ordering::Acquire) {
            return Err(AuthFailure::new(
                AuthErrorKind::SessionExpired,
                format!("{} strategy cannot re-authenticate", self.strategy.name()),
            ));
        }

        tracing::info!(
            strategy = self.strategy.name(),
            tenant_host = self.strategy.tenant_host(),
            "acquiring session"
        );

        match self.exchange().await {
            Ok(session) => {
                self.spent.store(true, Ordering::Release);
                let session = store.replace(session);
                tracing::info!(
                    strategy = self.strategy.name(),
                    tenant_host = session.tenant_host(),
                    api_version = %session.api_version(),
                    "session acquired"
                );
                Ok(session)
            }
            Err(failure) => {
                tracing::warn!(
                    strategy = self.strategy.name(),
                    tenant_host = self.strategy.tenant_host(),
                    kind = %failure.kind,
                    "session acquisition failed"
                );
                self.absorb(store, &failure);
                Err(failure)
            }
        }
    }

    /// Runs the strategy's network exchange. Touches no state.
    async fn exchange(&self) -> AuthOutcome {
        let host = self.strategy.tenant_host();
        let bootstrap = self.bootstrap_version();

        let session = match &self.strategy {
            CredentialStrategy::Basic {
                username, password, ..
            } => {
                let request = self
                    .identified(TransportRequest::post(host, bootstrap.api_path("auth")))
                    .form("username", username)
                    .form("password", password.expose_secret());
                let envelope = self.call("authenticate", Call::Acquire, request).await?;
                session_from(&envelope, "sessionId", host, bootstrap)?
            }
            CredentialStrategy::SessionToken { token, .. } => {
                let session = Session::new(token.expose_secret(), host, bootstrap)
                    .ok_or_else(|| AuthFailure::new(AuthErrorKind::MissingField, "token"))?;
                if !self.options.validate_on_build {
                    return Ok(session);
                }
                self.check(&session).await?;
                session
            }
            CredentialStrategy::OAuthAccessToken {
                oauth_profile_id,
                oauth_client_id,
                identity_provider_access_token,
                ..
            } => {
                self.oauth_session(
                    oauth_profile_id,
                    oauth_client_id,
                    identity_provider_access_token.expose_secret(),
                    bootstrap,
                )
                .await?
            }
            CredentialStrategy::OAuthDiscovery {
                oauth_profile_id,
                oauth_client_id,
                identity_provider_username,
                identity_provider_password,
                ..
            } => {
                let request = self.identified(oauth::discovery_request(
                    host,
                    identity_provider_username.as_deref(),
                    oauth_client_id,
                ));
                let envelope = self.call("discovery", Call::Acquire, request).await?;
                let profile = oauth::find_profile(&envelope.payload, oauth_profile_id)?;
                tracing::debug!(
                    profile = %profile.id,
                    token_endpoint = %profile.token_endpoint,
                    "resolved identity provider"
                );

                let username = identity_provider_username
                    .clone()
                    .or(profile.username)
                    .ok_or_else(|| {
                        AuthFailure::new(
                            AuthErrorKind::InvalidCredentials,
                            "no identity provider username supplied or discovered",
                        )
                    })?;
                let grant = oauth::password_grant_request(
                    &profile.token_endpoint,
                    &username,
                    identity_provider_password.expose_secret(),
                    oauth_client_id,
                );
                let access_token = self
                    .send("password_grant", &self.options.retry, grant, oauth::interpret_grant)
                    .await?;

                self.oauth_session(
                    oauth_profile_id,
                    oauth_client_id,
                    access_token.expose_secret(),
                    bootstrap,
                )
                .await?
            }
        };

        let version = self
            .negotiate(session.tenant_host(), session.token(), session.api_version())
            .await;
        Ok(session.with_api_version(version))
    }

    async fn oauth_session(
        &self,
        profile_id: &str,
        client_id: &str,
        access_token: &str,
        version: ApiVersion,
    ) -> AuthOutcome {
        let host = self.strategy.tenant_host();
        let request =
            self.identified(oauth::session_request(host, profile_id, client_id, access_token));
        let envelope = self.call("oauth_session", Call::Acquire, request).await?;
        session_from(&envelope, "sessionId", host, version)
    }

    async fn delegate_locked(
        &self,
        store: &mut StoreWriter<'_>,
        session: &Session,
        grant: &DelegationGrant,
    ) -> Result<Arc<Session>, AuthFailure> {
        let request = self
            .authorized(
                TransportRequest::post(
                    session.tenant_host(),
                    session.api_version().api_path(DELEGATED_LOGIN),
                ),
                session,
            )
            .form("vault_id", &grant.tenant_id)
            .form("delegator_userid", &grant.delegator_user_id);

        // Not idempotent: a retried login could mint a second session.
        let envelope = match self
            .send("initiate_delegated_session", &RetryConfig::no_retry(), request, |r| {
                policy::interpret(r, Call::Delegation)
            })
            .await
        {
            Ok(envelope) => envelope,
            Err(failure) => {
                self.absorb(store, &failure);
                return Err(failure);
            }
        };

        let host = match grant.tenant_host.as_deref().filter(|h| !h.trim().is_empty()) {
            Some(dns) => normalize_tenant_host(dns)
                .map_err(|e| AuthFailure::unexpected_shape(e.to_string()))?,
            None => session.tenant_host().to_string(),
        };
        let delegated = session_from(&envelope, "delegated_sessionid", &host, session.api_version())?
            .with_user_id(session.user_id().map(str::to_string))
            .delegated_for(grant.delegator_user_id.clone());

        let version = self
            .negotiate(&host, delegated.token(), delegated.api_version())
            .await;
        let delegated = store.replace_delegated(delegated.with_api_version(version));

        tracing::info!(
            tenant_id = %grant.tenant_id,
            tenant_host = delegated.tenant_host(),
            delegator_user_id = %grant.delegator_user_id,
            "delegated session started"
        );
        Ok(delegated)
    }

    async fn revalidate_locked(
        &self,
        store: &mut StoreWriter<'_>,
        session: &Arc<Session>,
    ) -> Result<Arc<Session>, AuthFailure> {
        match self.check(session).await {
            Ok(()) => Ok(self.touch(store, session)),
            Err(failure) => {
                self.absorb(store, &failure);
                Err(failure)
            }
        }
    }

    /// Re-acquires when the strategy and delegation state allow it, otherwise
    /// hands back `failure`.
    async fn recover(
        &self,
        store: &mut StoreWriter<'_>,
        failure: AuthFailure,
    ) -> Result<Arc<Session>, AuthFailure> {
        let renewable = self.strategy.retains_credentials() || !self.spent.load(Ordering::Acquire);
        if store.state() != DelegationState::Direct || !renewable {
            return Err(failure);
        }
        tracing::info!(
            strategy = self.strategy.name(),
            reason = %failure.kind,
            "re-acquiring session"
        );
        self.acquire_locked(store).await
    }

    fn touch(&self, store: &mut StoreWriter<'_>, session: &Session) -> Arc<Session> {
        store.replace(session.touched(Utc::now()))
    }

    /// Revocation is terminal for the strategy: the store drops the session
    /// and refuses every later re-acquisition.
    fn absorb(&self, store: &mut StoreWriter<'_>, failure: &AuthFailure) {
        if failure.kind != AuthErrorKind::SessionRevoked {
            return;
        }
        tracing::warn!(
            strategy = self.strategy.name(),
            delegated = store.state() == DelegationState::Delegated,
            message = %failure.message,
            "session revoked"
        );
        store.revoke();
    }

    async fn check(&self, session: &Session) -> Result<(), AuthFailure> {
        let request = self.authorized(
            TransportRequest::get(session.tenant_host(), session.api_version().api_path(WHO_AM_I)),
            session,
        );
        self.call("validate", Call::Session, request).await.map(|_| ())
    }

    async fn fetch_versions(&self, host: &str, token: &str) -> Result<Vec<ApiVersion>, AuthFailure> {
        let request = self
            .identified(TransportRequest::get(host, VERSIONS_PATH))
            .header(AUTHORIZATION_HEADER, token);
        let envelope = self.call("list_versions", Call::Session, request).await?;
        Ok(version::parse_version_listing(&envelope.payload))
    }

    async fn fetch_grants(&self, session: &Session) -> Result<Vec<DelegationGrant>, AuthFailure> {
        let request = self.authorized(
            TransportRequest::get(session.tenant_host(), session.api_version().api_path(DELEGATIONS)),
            session,
        );
        let envelope = self.call("list_delegations", Call::Delegation, request).await?;
        parse_grants(&envelope.payload)
    }

    /// Highest version both sides speak; `fallback` when pinned or the listing fails.
    async fn negotiate(&self, host: &str, token: &str, fallback: ApiVersion) -> ApiVersion {
        if self.options.api_version.is_some() {
            return fallback;
        }
        match self.fetch_versions(host, token).await {
            Ok(offered) => version::negotiate(offered, &self.supported).unwrap_or_else(|| {
                tracing::debug!(%fallback, "no mutually supported API version");
                fallback
            }),
            Err(failure) => {
                tracing::debug!(%fallback, kind = %failure.kind, "version listing failed");
                fallback
            }
        }
    }

    /// Version used before negotiation: the pinned one, else the newest supported.
    pub(crate) fn bootstrap_version(&self) -> ApiVersion {
        self.options.api_version.unwrap_or_else(|| {
            self.supported
                .iter()
                .copied()
                .max()
                .unwrap_or_else(ApiVersion::latest_supported)
        })
    }

    fn identified(&self, request: TransportRequest) -> TransportRequest {
        request.header(CLIENT_ID_HEADER, self.client_id.as_str())
    }

    fn authorized(&self, request: TransportRequest, session: &Session) -> TransportRequest {
        self.identified(request)
            .header(AUTHORIZATION_HEADER, session.token())
    }

    async fn call(
        &self,
        operation: &'static str,
        call: Call,
        request: TransportRequest,
    ) -> Result<Envelope, AuthFailure> {
        self.send(operation, &self.options.retry, request, |r| {
            policy::interpret(r, call)
        })
        .await
    }

    async fn send<T>(
        &self,
        operation: &'static str,
        retry: &RetryConfig,
        request: TransportRequest,
        interpret: impl Fn(TransportResponse) -> Result<T, AuthFailure>,
    ) -> Result<T, AuthFailure> {
        let interpret = &interpret;
        let result = retry
            .run(operation, || {
                let request = request.clone();
                async move {
                    let response = self
                        .transport
                        .send(request)
                        .await
                        .map_err(|e| policy::from_transport(e, self.options.timeout))?;
                    interpret(response)
                }
            })
            .await;

        if let Err(failure) = &result {
            self.log_failure(operation, failure);
        }
        result
    }

    fn log_failure(&self, operation: &'static str, failure: &AuthFailure) {
        match &failure.error_type {
            Some(error_type) if self.options.log_api_errors => tracing::warn!(
                operation,
                kind = %failure.kind,
                error_type = %error_type,
                message = %failure.message,
                "API call failed"
            ),
            _ => tracing::debug!(
                operation,
                kind = %failure.kind,
                message = %failure.message,
                "call failed"
            ),
        }
    }

    async fn within_deadline<T>(
        &self,
        operation: &'static str,
        work: impl Future<Output = Result<T, AuthFailure>>,
    ) -> Result<T, AuthFailure> {
        match tokio::time::timeout(self.options.timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.options.timeout.as_millis() as u64,
                    "session operation timed out"
                );
                Err(AuthFailure::timeout(self.options.timeout))
            }
        }
    }
}

fn is_fresh(session: &Session, max_age: Duration) -> bool {
    let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
    session.age_since_validation(Utc::now()) <= max_age
}

/// Why the store holds no session.
fn absent(store: &StoreWriter<'_>) -> AuthFailure {
    match store.state() {
        DelegationState::Revoked => AuthFailure::revoked(),
        _ => AuthFailure::no_session(),
    }
}

fn delegation_source(store: &StoreWriter<'_>) -> Result<Arc<Session>, AuthFailure> {
    let reason = match store.state() {
        DelegationState::Direct => match store.current() {
            Some(session) => return Ok(session),
            None => "no active session to delegate from",
        },
        DelegationState::Delegated => "already delegated; delegation cannot be chained",
        DelegationState::Revoked => "access was revoked",
    };
    Err(AuthFailure::new(AuthErrorKind::DelegationNotPermitted, reason))
}

fn session_from(
    envelope: &Envelope,
    token_field: &str,
    host: &str,
    version: ApiVersion,
) -> AuthOutcome {
    let token = envelope.str_field(token_field).ok_or_else(|| {
        AuthFailure::unexpected_shape(format!("response has no {}", token_field))
    })?;
    let session = Session::new(token, host, version)
        .ok_or_else(|| AuthFailure::unexpected_shape("empty session token"))?;
    Ok(session.with_user_id(id_field(&envelope.payload, "userId")))
}

fn id_field(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_grants(payload: &Value) -> Result<Vec<DelegationGrant>, AuthFailure> {
    match payload.get("delegated_vaults") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(grants) => Vec::<DelegationGrant>::deserialize(grants)
            .map_err(|e| AuthFailure::unexpected_shape(format!("delegation list: {}", e))),
    }
}
