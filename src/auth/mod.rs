//! Credentials, caller identity, and authentication outcomes.
//!
//! Supported strategies:
//! - **Basic**: username/password login, renewable
//! - **SessionToken**: reuse of an existing session, single-shot
//! - **OAuthAccessToken**: identity-provider token exchange, single-shot
//! - **OAuthDiscovery**: provider discovery + password grant + exchange, renewable

mod credential;
mod identity;
mod outcome;

pub use credential::{CredentialStrategy, normalize_tenant_host};
pub use identity::ClientIdentity;
pub use outcome::{AuthErrorKind, AuthFailure, AuthOutcome};
