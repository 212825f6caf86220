//! In-memory session state machine.
//!
//! Pure data and mutation rules, no I/O. A session always has exactly one
//! host and zero-or-more distinct viewers; creation and host assignment are
//! atomic. All operations serialize through one registry-level lock, which
//! gives single-session-granularity atomicity.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use vigil_core::VigilError;

pub type ConnectionId = Uuid;
pub type SessionId = String;

#[derive(Debug)]
struct Session {
    host: ConnectionId,
    viewers: HashSet<ConnectionId>,
    started_at: DateTime<Utc>,
}

/// Read-only view of a session, taken under the lock and handed to callers
/// for notification fan-out.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub host: ConnectionId,
    pub viewers: HashSet<ConnectionId>,
    pub started_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Host plus viewers.
    pub fn members(&self) -> Vec<ConnectionId> {
        let mut all = Vec::with_capacity(self.viewers.len() + 1);
        all.push(self.host);
        all.extend(self.viewers.iter().copied());
        all
    }
}

/// A session removed from the registry, with the viewer set captured so the
/// caller can deliver `session-ended` after deletion is finalized.
#[derive(Debug, Clone)]
pub struct EndedSession {
    pub id: SessionId,
    pub viewers: Vec<ConnectionId>,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh session with `host` as its sole producer. Never
    /// fails; ids are never reused.
    pub async fn create_session(&self, host: ConnectionId) -> SessionId {
        let id = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            id.clone(),
            Session {
                host,
                viewers: HashSet::new(),
                started_at: Utc::now(),
            },
        );
        id
    }

    /// Add `viewer` to the session. Re-joining is a no-op, not an error.
    pub async fn join_session(
        &self,
        session_id: &str,
        viewer: ConnectionId,
    ) -> Result<SessionSnapshot, VigilError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| VigilError::SessionNotFound(session_id.to_string()))?;
        session.viewers.insert(viewer);
        Ok(SessionSnapshot {
            id: session_id.to_string(),
            host: session.host,
            viewers: session.viewers.clone(),
            started_at: session.started_at,
        })
    }

    /// Remove `viewer` if present. Returns the host for departure
    /// notification when a removal actually happened; a no-op when the
    /// session or the viewer entry is already gone.
    pub async fn leave_session(
        &self,
        session_id: &str,
        viewer: ConnectionId,
    ) -> Option<ConnectionId> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(session_id)?;
        session.viewers.remove(&viewer).then_some(session.host)
    }

    /// Remove every session hosted by `host`, returning each with its
    /// viewer set for `session-ended` delivery.
    pub async fn end_sessions_for_host(&self, host: ConnectionId) -> Vec<EndedSession> {
        let mut sessions = self.sessions.write().await;
        let ended_ids: Vec<SessionId> = sessions
            .iter()
            .filter(|(_, s)| s.host == host)
            .map(|(id, _)| id.clone())
            .collect();
        ended_ids
            .into_iter()
            .filter_map(|id| {
                sessions.remove(&id).map(|s| EndedSession {
                    id,
                    viewers: s.viewers.into_iter().collect(),
                })
            })
            .collect()
    }

    /// Remove sessions whose host is no longer in `live`. Used by the
    /// periodic sweep to reap entries orphaned without a disconnect event.
    pub async fn end_sessions_missing_hosts(
        &self,
        live: &HashSet<ConnectionId>,
    ) -> Vec<EndedSession> {
        let mut sessions = self.sessions.write().await;
        let orphaned: Vec<SessionId> = sessions
            .iter()
            .filter(|(_, s)| !live.contains(&s.host))
            .map(|(id, _)| id.clone())
            .collect();
        orphaned
            .into_iter()
            .filter_map(|id| {
                sessions.remove(&id).map(|s| EndedSession {
                    id,
                    viewers: s.viewers.into_iter().collect(),
                })
            })
            .collect()
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionSnapshot> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).map(|s| SessionSnapshot {
            id: session_id.to_string(),
            host: s.host,
            viewers: s.viewers.clone(),
            started_at: s.started_at,
        })
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
