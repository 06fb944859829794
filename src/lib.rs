//! # tenant-session
//!
//! Client-side authentication and session lifecycle for multi-tenant REST
//! APIs: credential strategies, session acquisition, validation and
//! keep-alive, delegated sessions, and API-version negotiation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tenant_session::{Client, ClientIdentity, ClientOptions, CredentialStrategy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tenant_session::Error> {
//!     let client = Client::build(
//!         CredentialStrategy::basic("acme.example.com", "jane@acme.com", "secret"),
//!         ClientIdentity::new("Acme", "Finance", "Reporting", false, "nightly-etl"),
//!         ClientOptions::default(),
//!     )
//!     .await?;
//!
//!     client.ensure_valid().await?;
//!     let path = client.api_path(None, "objects/documents");
//!     println!("{} as {:?}", path, client.authorization_headers());
//!     Ok(())
//! }
//! ```
//!
//! ## Delegation
//!
//! ```rust,no_run
//! # async fn run(client: tenant_session::Client) -> Result<(), tenant_session::Error> {
//! for grant in client.list_delegations().await? {
//!     println!("{} via {}", grant.tenant_id, grant.delegator_user_id);
//! }
//! client.initiate_delegated_session("1001", "2002").await?;
//! assert!(client.is_delegated());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod auth;
pub mod client;
pub mod config;
pub mod oauth;
pub mod prelude;
pub mod session;
pub mod transport;
pub mod version;

pub use auth::{
    AuthErrorKind, AuthFailure, AuthOutcome, ClientIdentity, CredentialStrategy,
    normalize_tenant_host,
};
pub use client::{Client, ClientBuilder, ExponentialBackoff, RetryConfig};
pub use config::{ClientOptions, ConfigError};
pub use session::{DelegationGrant, DelegationState, Session, SessionManager};
pub use transport::{
    ApiErrorType, AuthTransport, HttpTransport, Method, TransportError, TransportRequest,
    TransportResponse,
};
pub use version::{ApiVersion, SUPPORTED_API_VERSIONS};

/// Error returned by client construction.
///
/// Configuration problems never reach the network; authentication failures
/// carry the classified [`AuthFailure`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Authentication or session call failed.
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthFailure),
}

impl Error {
    /// Failure kind; `MissingField` for missing configuration fields.
    pub fn auth_kind(&self) -> Option<AuthErrorKind> {
        match self {
            Error::Auth(failure) => Some(failure.kind),
            Error::Config(ConfigError::MissingField(_)) => Some(AuthErrorKind::MissingField),
            Error::Config(_) => None,
        }
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Auth(failure) if failure.is_retryable())
    }
}

/// Result type for tenant-session operations.
pub type Result<T> = std::result::Result<T, Error>;
