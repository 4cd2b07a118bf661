//! Ordered fallback across inference backends.
//!
//! For each backend in priority order the dispatcher first consults the
//! response cache, then calls the backend. The first usable answer wins and
//! the remaining backends are never tried. Failures are logged and skipped;
//! when every backend fails the caller gets a deterministic fallback reply.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::backend::{BackendDescriptor, BackendId};
use crate::cache::{CacheKey, ResponseCache};
use crate::fallback::FallbackReplies;
use crate::transport::CompletionTransport;

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// A backend (or the cache on its behalf) produced the answer.
    Answered {
        /// Backend that answered.
        backend: BackendId,
        /// Generated text.
        text: String,
        /// Whether the answer came from the cache.
        cached: bool,
    },
    /// No backend answered; `text` is the fallback reply.
    Exhausted {
        /// Fallback text shown to the user.
        text: String,
    },
}

impl DispatchResult {
    /// Reply text, whichever way it was produced.
    pub fn text(&self) -> &str {
        match self {
            DispatchResult::Answered { text, .. } | DispatchResult::Exhausted { text } => text,
        }
    }

    /// Consume into the reply text.
    pub fn into_text(self) -> String {
        match self {
            DispatchResult::Answered { text, .. } | DispatchResult::Exhausted { text } => text,
        }
    }

    /// Backend that answered, if any.
    pub fn backend(&self) -> Option<BackendId> {
        match self {
            DispatchResult::Answered { backend, .. } => Some(*backend),
            DispatchResult::Exhausted { .. } => None,
        }
    }

    /// Whether every backend failed.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, DispatchResult::Exhausted { .. })
    }
}

/// Tries configured backends in order until one answers.
pub struct ModelFallbackDispatcher {
    backends: Vec<BackendDescriptor>,
    transport: Arc<dyn CompletionTransport>,
    cache: Arc<ResponseCache>,
    fallback: FallbackReplies,
}

impl ModelFallbackDispatcher {
    /// Create a dispatcher; `backends` are sorted by rank.
    pub fn new(
        mut backends: Vec<BackendDescriptor>,
        transport: Arc<dyn CompletionTransport>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        backends.sort_by_key(|b| b.rank);
        Self {
            backends,
            transport,
            cache,
            fallback: FallbackReplies,
        }
    }

    /// Backends in priority order.
    pub fn backends(&self) -> &[BackendDescriptor] {
        &self.backends
    }

    /// Whether `id` has a descriptor.
    pub fn has_backend(&self, id: BackendId) -> bool {
        self.backends.iter().any(|b| b.id == id)
    }

    /// The highest-priority backend.
    pub fn primary(&self) -> Option<BackendId> {
        self.backends.first().map(|b| b.id)
    }

    /// The shared response cache.
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Dispatch using the global priority order.
    pub async fn dispatch(&self, prompt: &str) -> DispatchResult {
        self.dispatch_from(None, prompt, prompt).await
    }

    /// Dispatch starting at `start`, then the other backends in priority order.
    ///
    /// An unknown or `None` start uses the global order. Every backend's cache
    /// entry is consulted before any network call. `message` is the user's
    /// newest text and only selects the canned reply on exhaustion.
    pub async fn dispatch_from(&self, start: Option<BackendId>, prompt: &str, message: &str) -> DispatchResult {
        let order = self.order_from(start);

        for backend in &order {
            if let Some(text) = self.cache.get(&CacheKey::new(backend.id, prompt)) {
                debug!(backend = %backend.id, "Response cache hit");
                return DispatchResult::Answered {
                    backend: backend.id,
                    text,
                    cached: true,
                };
            }
        }

        for backend in order {
            match self.transport.complete(backend, prompt).await {
                Ok(text) => {
                    info!(backend = %backend.id, chars = text.len(), "Backend answered");
                    self.cache.put(CacheKey::new(backend.id, prompt), text.clone());
                    return DispatchResult::Answered {
                        backend: backend.id,
                        text,
                        cached: false,
                    };
                }
                Err(e) => {
                    warn!(backend = %backend.id, error = %e, "Backend failed, trying next");
                }
            }
        }

        error!(backends = self.backends.len(), "All backends failed, using fallback reply");
        DispatchResult::Exhausted {
            text: self.fallback.reply_for(message).to_string(),
        }
    }

    /// Backends in the order they will be tried.
    pub fn order_from(&self, start: Option<BackendId>) -> Vec<&BackendDescriptor> {
        let first = start.and_then(|id| self.backends.iter().find(|b| b.id == id));
        first
            .into_iter()
            .chain(self.backends.iter().filter(|b| Some(b.id) != first.map(|f| f.id)))
            .collect()
    }
}
