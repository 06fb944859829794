//! Session state and lifecycle.

pub mod manager;
pub mod model;
pub(crate) mod policy;
pub mod store;

pub use manager::SessionManager;
pub use model::{DelegationGrant, DelegationState, Session};
pub use store::{SessionStore, Snapshot};
