//! Session registry: the process-wide map of open connections.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use locus_core::{Position, SessionId};
use tokio::sync::{RwLock, mpsc};

/// An outbound frame: JSON serialized once, shared across recipients.
pub type Frame = Arc<String>;

/// One open connection as tracked by the registry.
struct Session {
    /// Send channel to the connection's WebSocket write task.
    outbound: mpsc::Sender<Frame>,
    /// Last reported position; absent until the first update.
    last_position: Option<Position>,
    /// Display label from the client's updates.
    user_id: Option<String>,
}

/// Read-only snapshot of a peer entry, as returned by
/// [`SessionRegistry::list_others`].
#[derive(Clone, Debug)]
pub struct Peer {
    /// The peer's session id.
    pub id: SessionId,
    /// Last reported position, absent until the peer's first update.
    pub last_position: Option<Position>,
    /// Display label from the peer's updates, if any.
    pub user_id: Option<String>,
}

/// Process-wide mapping from session id to live connection state.
///
/// Owned by [`crate::state::AppState`] and passed by reference into each
/// channel handler — no ambient global. An entry exists exactly while the
/// underlying channel is open: inserted on connect, removed synchronously
/// with closure. Handlers hold the lock only across the map operation and
/// never across I/O, so the map is never observed torn.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Session>>,
    /// Atomic count of open sessions (avoids read-locking for count queries).
    active_count: AtomicUsize,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Allocate a fresh id and insert an entry with no known position.
    ///
    /// The entry is immediately visible to broadcasts.
    pub async fn register(&self, outbound: mpsc::Sender<Frame>) -> SessionId {
        let id = SessionId::generate();
        let session = Session {
            outbound,
            last_position: None,
            user_id: None,
        };
        let mut sessions = self.sessions.write().await;
        if sessions.insert(id.clone(), session).is_none() {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        }
        id
    }

    /// Overwrite the last known position for `id`.
    ///
    /// Returns `false` without touching the map when `id` is unknown — an
    /// update racing a disconnect is tolerated and no entry materializes.
    /// A `None` `user_id` keeps any previously recorded label.
    pub async fn update(
        &self,
        id: &SessionId,
        position: Position,
        user_id: Option<String>,
    ) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(session) => {
                session.last_position = Some(position);
                if user_id.is_some() {
                    session.user_id = user_id;
                }
                true
            }
            None => false,
        }
    }

    /// Remove the entry for `id`. Idempotent.
    ///
    /// Returns whether an entry was actually present.
    pub async fn remove(&self, id: &SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(id).is_some() {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Snapshot of every entry except `exclude`.
    ///
    /// Ordering is whatever the map yields; callers must not depend on it.
    pub async fn list_others(&self, exclude: &SessionId) -> Vec<Peer> {
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .filter(|(id, _)| *id != exclude)
            .map(|(id, session)| Peer {
                id: id.clone(),
                last_position: session.last_position,
                user_id: session.user_id.clone(),
            })
            .collect()
    }

    /// Outbound senders for every entry except `exclude`.
    ///
    /// Senders are cloned out so the caller fans out without holding the
    /// registry lock.
    pub(crate) async fn peer_senders(
        &self,
        exclude: &SessionId,
    ) -> Vec<(SessionId, mpsc::Sender<Frame>)> {
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .filter(|(id, _)| *id != exclude)
            .map(|(id, session)| (id.clone(), session.outbound.clone()))
            .collect()
    }

    /// Number of open sessions.
    #[must_use]
    pub fn count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
