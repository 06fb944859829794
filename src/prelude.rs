//! Prelude module for convenient imports.
//!
//! ```rust
//! use tenant_session::prelude::*;
//! ```

pub use crate::Error;
pub use crate::Result;

// Credentials
pub use crate::auth::{AuthErrorKind, AuthFailure, AuthOutcome, ClientIdentity, CredentialStrategy};

// Client
pub use crate::client::{Client, ClientBuilder};
pub use crate::config::ClientOptions;

// Session
pub use crate::session::{DelegationGrant, DelegationState, Session};
pub use crate::version::ApiVersion;
