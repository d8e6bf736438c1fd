//! Chat sessions and their histories.
//!
//! Each session owns an append-only history. A question and its answer are
//! appended under one lock, so a history always alternates user/assistant.
//! Sessions idle for longer than the timeout are dropped; using an expired
//! id reports `SessionNotFound` and the client starts a new session.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use histochat_core::types::{ChatMessage, View};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ChatError;

/// One user's interaction lifetime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub current_view: View,
    pub history: Vec<ChatMessage>,
}

impl ChatSession {
    fn new(view: View) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            started_at: now,
            last_active_at: now,
            current_view: view,
            history: Vec::new(),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            started_at: self.started_at,
            last_active_at: self.last_active_at,
            current_view: self.current_view,
            message_count: self.history.len(),
        }
    }
}

/// Listing entry for a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub current_view: View,
    pub message_count: usize,
}

pub struct SessionManager {
    sessions: Mutex<HashMap<Uuid, ChatSession>>,
    timeout: chrono::Duration,
    default_view: View,
}

impl SessionManager {
    pub fn new(timeout_minutes: u32, default_view: View) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout: chrono::Duration::minutes(i64::from(timeout_minutes)),
            default_view,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, ChatSession>>, ChatError> {
        self.sessions
            .lock()
            .map_err(|e| ChatError::Internal(format!("session lock poisoned: {}", e)))
    }

    fn is_expired(&self, session: &ChatSession, now: DateTime<Utc>) -> bool {
        now - session.last_active_at > self.timeout
    }

    /// Run `f` on a live session, refreshing its activity time.
    fn with_session<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut ChatSession) -> T,
    ) -> Result<T, ChatError> {
        let now = Utc::now();
        let mut sessions = self.lock()?;
        let expired = match sessions.get(&id) {
            None => return Err(ChatError::SessionNotFound(id)),
            Some(session) => self.is_expired(session, now),
        };
        if expired {
            sessions.remove(&id);
            info!(session = %id, "Session expired");
            return Err(ChatError::SessionNotFound(id));
        }
        let session = sessions
            .get_mut(&id)
            .ok_or(ChatError::SessionNotFound(id))?;
        session.last_active_at = now;
        Ok(f(session))
    }

    pub fn create(&self) -> Result<ChatSession, ChatError> {
        let session = ChatSession::new(self.default_view);
        self.lock()?.insert(session.id, session.clone());
        info!(session = %session.id, "Session started");
        Ok(session)
    }

    /// End a session, dropping its history.
    pub fn end(&self, id: Uuid) -> Result<(), ChatError> {
        match self.lock()?.remove(&id) {
            Some(session) => {
                info!(session = %id, messages = session.history.len(), "Session ended");
                Ok(())
            }
            None => Err(ChatError::SessionNotFound(id)),
        }
    }

    /// Live sessions, oldest first.
    pub fn list(&self) -> Result<Vec<SessionSummary>, ChatError> {
        let now = Utc::now();
        let mut summaries: Vec<SessionSummary> = self
            .lock()?
            .values()
            .filter(|s| !self.is_expired(s, now))
            .map(ChatSession::summary)
            .collect();
        summaries.sort_by_key(|s| s.started_at);
        Ok(summaries)
    }

    pub fn snapshot(&self, id: Uuid) -> Result<ChatSession, ChatError> {
        self.with_session(id, |s| s.clone())
    }

    pub fn history(&self, id: Uuid) -> Result<Vec<ChatMessage>, ChatError> {
        self.with_session(id, |s| s.history.clone())
    }

    pub fn set_view(&self, id: Uuid, view: View) -> Result<ChatSession, ChatError> {
        self.with_session(id, |s| {
            s.current_view = view;
            s.clone()
        })
    }

    /// Append a question and its answer together. Returns the new history length.
    pub fn append_exchange(
        &self,
        id: Uuid,
        question: ChatMessage,
        answer: ChatMessage,
    ) -> Result<usize, ChatError> {
        self.with_session(id, |s| {
            s.history.push(question);
            s.history.push(answer);
            s.history.len()
        })
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, ChatError> {
        let now = Utc::now();
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|_, s| !self.is_expired(s, now));
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, "Purged expired sessions");
        }
        Ok(removed)
    }

    #[cfg(test)]
    fn backdate(&self, id: Uuid, minutes: i64) {
        if let Some(s) = self.sessions.lock().unwrap().get_mut(&id) {
            s.last_active_at = s.last_active_at - chrono::Duration::minutes(minutes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use histochat_core::types::ChatRole;

    fn manager() -> SessionManager {
        SessionManager::new(30, View::Home)
    }

    #[test]
    fn test_create_session_defaults() {
        let mgr = manager();
        let session = mgr.create().unwrap();
        assert_ne!(session.id, Uuid::nil());
        assert_eq!(session.current_view, View::Home);
        assert!(session.history.is_empty());
        assert_eq!(mgr.list().unwrap().len(), 1);
    }

    #[test]
    fn test_append_exchange_keeps_pairs_in_order() {
        let mgr = manager();
        let id = mgr.create().unwrap().id;
        mgr.append_exchange(id, ChatMessage::user("A"), ChatMessage::assistant("X"))
            .unwrap();
        let len = mgr
            .append_exchange(id, ChatMessage::user("B"), ChatMessage::assistant("Y"))
            .unwrap();
        assert_eq!(len, 4);

        let history = mgr.history(id).unwrap();
        let roles: Vec<ChatRole> = history.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::User, ChatRole::Assistant, ChatRole::User, ChatRole::Assistant]
        );
        assert_eq!(history[2].content, "B");
        assert_eq!(mgr.list().unwrap()[0].message_count, 4);
    }

    #[test]
    fn test_end_session_drops_history() {
        let mgr = manager();
        let id = mgr.create().unwrap().id;
        mgr.append_exchange(id, ChatMessage::user("A"), ChatMessage::assistant("X"))
            .unwrap();
        mgr.end(id).unwrap();
        assert!(matches!(mgr.history(id), Err(ChatError::SessionNotFound(_))));
        assert!(matches!(mgr.end(id), Err(ChatError::SessionNotFound(_))));
    }

    #[test]
    fn test_unknown_session() {
        let mgr = manager();
        let id = Uuid::new_v4();
        assert!(matches!(mgr.snapshot(id), Err(ChatError::SessionNotFound(x)) if x == id));
    }

    #[test]
    fn test_set_view() {
        let mgr = manager();
        let id = mgr.create().unwrap().id;
        let session = mgr.set_view(id, View::Chat).unwrap();
        assert_eq!(session.current_view, View::Chat);
        assert_eq!(mgr.snapshot(id).unwrap().current_view, View::Chat);
    }

    #[test]
    fn test_expired_session_is_dropped_on_use() {
        let mgr = manager();
        let id = mgr.create().unwrap().id;
        mgr.backdate(id, 31);
        assert!(mgr.list().unwrap().is_empty());
        assert!(matches!(mgr.history(id), Err(ChatError::SessionNotFound(_))));
        assert!(matches!(mgr.end(id), Err(ChatError::SessionNotFound(_))));
    }

    #[test]
    fn test_activity_refreshes_expiry() {
        let mgr = manager();
        let id = mgr.create().unwrap().id;
        mgr.backdate(id, 29);
        mgr.history(id).unwrap();
        mgr.backdate(id, 29);
        assert!(mgr.history(id).is_ok());
    }

    #[test]
    fn test_purge_expired() {
        let mgr = manager();
        let stale = mgr.create().unwrap().id;
        let fresh = mgr.create().unwrap().id;
        mgr.backdate(stale, 45);
        assert_eq!(mgr.purge_expired().unwrap(), 1);
        assert!(mgr.snapshot(fresh).is_ok());
        assert_eq!(mgr.purge_expired().unwrap(), 0);
    }
}
