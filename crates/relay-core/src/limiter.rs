//! Per-user cooldown gate.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::session::UserId;

/// Default cooldown between two accepted requests from the same user.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3);

/// Allows at most one request per user per cooldown window.
///
/// Timestamps live in a sharded map, so checks for different users do not
/// contend on a single lock.
#[derive(Debug)]
pub struct RateLimiter {
    cooldown: TimeDelta,
    last_request: DashMap<UserId, DateTime<Utc>>,
}

impl RateLimiter {
    /// Create a limiter with the given cooldown window.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown: TimeDelta::from_std(cooldown).unwrap_or(TimeDelta::MAX),
            last_request: DashMap::new(),
        }
    }

    /// Check and record a request at `now`.
    ///
    /// Returns `false` without touching state when the user's previous
    /// accepted request is less than one cooldown ago.
    pub fn allow(&self, user: UserId, now: DateTime<Utc>) -> bool {
        match self.last_request.entry(user) {
            Entry::Occupied(mut last) => {
                if now.signed_duration_since(*last.get()) < self.cooldown {
                    return false;
                }
                last.insert(now);
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
            }
        }
        true
    }

    /// Time left until `user` may send again (zero when allowed).
    pub fn retry_after(&self, user: UserId, now: DateTime<Utc>) -> Duration {
        self.last_request
            .get(&user)
            .and_then(|last| last.checked_add_signed(self.cooldown))
            .and_then(|until| until.signed_duration_since(now).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    /// Timestamp of the user's last accepted request.
    pub fn last_request(&self, user: UserId) -> Option<DateTime<Utc>> {
        self.last_request.get(&user).map(|last| *last)
    }

    /// The configured cooldown window.
    pub fn cooldown(&self) -> Duration {
        self.cooldown.to_std().unwrap_or(Duration::MAX)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}
