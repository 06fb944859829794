//! Per-client session storage.
//!
//! Readers clone an `Arc` snapshot and never wait on network calls. Writers
//! hold an async mutex for the whole read-modify-write so concurrent
//! acquisitions and refreshes are serialized; each publish swaps token,
//! API version and delegation state together.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};

use super::model::{DelegationState, Session};

/// Consistent view of the store at one instant.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub session: Option<Arc<Session>>,
    pub state: DelegationState,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    snapshot: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        self.snapshot().session.clone()
    }

    pub fn state(&self) -> DelegationState {
        self.snapshot().state
    }

    /// Takes the single writer lock.
    pub async fn lock(&self) -> StoreWriter<'_> {
        StoreWriter {
            store: self,
            _guard: self.writer.lock().await,
        }
    }

    fn publish(&self, snapshot: Snapshot) {
        *self.snapshot.write() = Arc::new(snapshot);
    }
}

/// Exclusive write access; dropping it releases the lock.
pub struct StoreWriter<'a> {
    store: &'a SessionStore,
    _guard: MutexGuard<'a, ()>,
}

impl StoreWriter<'_> {
    pub fn current(&self) -> Option<Arc<Session>> {
        self.store.current()
    }

    pub fn state(&self) -> DelegationState {
        self.store.state()
    }

    /// Installs `session`, keeping the delegation state.
    pub fn replace(&mut self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.store.publish(Snapshot {
            session: Some(session.clone()),
            state: self.state(),
        });
        session
    }

    /// Installs a delegated session and moves to [`DelegationState::Delegated`].
    pub fn replace_delegated(&mut self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.store.publish(Snapshot {
            session: Some(session.clone()),
            state: DelegationState::Delegated,
        });
        session
    }

    /// Drops the session, keeping the delegation state.
    pub fn clear(&mut self) {
        self.store.publish(Snapshot {
            session: None,
            state: self.state(),
        });
    }

    /// Drops the session and enters the terminal revoked state.
    pub fn revoke(&mut self) {
        self.store.publish(Snapshot {
            session: None,
            state: DelegationState::Revoked,
        });
    }
}
