//! Bounded per-user conversation log.

use std::collections::VecDeque;

use dashmap::DashMap;

use crate::session::UserId;

/// Default number of remembered entries (three user/reply turns).
pub const DEFAULT_MEMORY_LIMIT: usize = 6;

/// Keeps the last `limit` entries per user, oldest first.
///
/// Eviction is purely size-based: appending past the limit drops the oldest
/// entry regardless of how recently anything was read.
#[derive(Debug)]
pub struct ConversationMemory {
    limit: usize,
    entries: DashMap<UserId, VecDeque<String>>,
}

impl ConversationMemory {
    /// Create a memory that keeps at most `limit` entries per user.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            entries: DashMap::new(),
        }
    }

    /// Entries for `user` in chronological order.
    pub fn read(&self, user: UserId) -> Vec<String> {
        self.entries
            .get(&user)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Append one entry, evicting from the front past the limit.
    pub fn append(&self, user: UserId, entry: impl Into<String>) {
        if self.limit == 0 {
            return;
        }
        let mut log = self.entries.entry(user).or_default();
        log.push_back(entry.into());
        while log.len() > self.limit {
            log.pop_front();
        }
    }

    /// Append a user message and its reply as one atomic step.
    pub fn append_turn(&self, user: UserId, message: impl Into<String>, reply: impl Into<String>) {
        if self.limit == 0 {
            return;
        }
        let mut log = self.entries.entry(user).or_default();
        log.push_back(message.into());
        log.push_back(reply.into());
        while log.len() > self.limit {
            log.pop_front();
        }
    }

    /// Forget everything remembered for `user`.
    pub fn clear(&self, user: UserId) {
        if let Some(mut log) = self.entries.get_mut(&user) {
            log.clear();
        }
    }

    /// Number of entries stored for `user`.
    pub fn len(&self, user: UserId) -> usize {
        self.entries.get(&user).map(|log| log.len()).unwrap_or(0)
    }

    /// Whether nothing is stored for `user`.
    pub fn is_empty(&self, user: UserId) -> bool {
        self.len(user) == 0
    }

    /// Maximum entries kept per user.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_LIMIT)
    }
}

/// Build the prompt sent to backends: remembered entries, then the new text.
pub fn compose_prompt(memory: &[String], text: &str) -> String {
    if memory.is_empty() {
        return text.to_string();
    }
    let mut prompt = memory.join("\n");
    prompt.push('\n');
    prompt.push_str(text);
    prompt
}
