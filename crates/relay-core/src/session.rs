//! Per-user session settings.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::backend::BackendId;

/// Opaque user identifier supplied by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        UserId(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user's preferences. Created on first contact, kept for the process lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSession {
    /// Backend to try first; `None` follows the global order.
    pub selected_backend: Option<BackendId>,
    /// Whether replies should be synthesized to audio.
    pub voice_enabled: bool,
}

/// Snapshot returned by the status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Backend tried first for this user.
    pub backend: Option<BackendId>,
    /// Whether `backend` was chosen by the user rather than the default order.
    pub backend_overridden: bool,
    /// Voice replies requested.
    pub voice_enabled: bool,
    /// Whether synthesis is possible at all in this process.
    pub voice_available: bool,
    /// Remembered entries.
    pub memory_entries: usize,
    /// Maximum remembered entries.
    pub memory_limit: usize,
    /// Last accepted request.
    pub last_request: Option<DateTime<Utc>>,
}

/// Table of sessions plus the per-user locks that order a user's turns.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<UserId, UserSession>,
    turn_locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current settings for `user` (defaults if never seen).
    pub fn get(&self, user: UserId) -> UserSession {
        self.sessions.entry(user).or_default().clone()
    }

    /// Apply `f` to the user's session, creating it if needed.
    pub fn update<R>(&self, user: UserId, f: impl FnOnce(&mut UserSession) -> R) -> R {
        let mut session = self.sessions.entry(user).or_default();
        f(&mut session)
    }

    /// Lock serializing one user's turns. Different users get different locks.
    pub fn turn_lock(&self, user: UserId) -> Arc<Mutex<()>> {
        self.turn_locks.entry(user).or_default().clone()
    }

    /// Number of known users.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no user has been seen.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
