//! Per-message orchestration.
//!
//! [`MessageRouter::route`] is the single entry point a transport calls for
//! each inbound text message. It applies the rate limit, builds the prompt
//! from the user's memory, dispatches it, records the turn, and optionally
//! converts the reply to audio. The admin operations used by bot commands
//! live here too.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::backend::{BackendDescriptor, BackendId};
use crate::cache::ResponseCache;
use crate::config::RelayConfig;
use crate::dispatcher::ModelFallbackDispatcher;
use crate::error::{RelayError, Result};
use crate::limiter::RateLimiter;
use crate::memory::{compose_prompt, ConversationMemory};
use crate::session::{SessionStatus, SessionStore, UserId};
use crate::transport::CompletionTransport;
use crate::voice::{VoiceArtifact, VoiceSynthesisAdapter};

/// A message the router answers instead of a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The user sent again before the cooldown expired.
    RateLimited {
        /// Time until the next message is accepted.
        retry_after: Duration,
    },
    /// The message was empty or whitespace.
    EmptyMessage,
}

impl Notice {
    /// Default user-facing wording.
    pub fn message(&self) -> String {
        match self {
            Notice::RateLimited { retry_after } => {
                let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
                format!("Please wait {}s before sending another message.", secs)
            }
            Notice::EmptyMessage => "Your message was empty. Please type something.".to_string(),
        }
    }
}

/// What the transport should deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutput {
    /// A text reply.
    Text(String),
    /// A synthesized reply; `text` is kept for transports that must fall back.
    Audio {
        /// The audio file.
        artifact: VoiceArtifact,
        /// The reply it was synthesized from.
        text: String,
    },
    /// A notice; nothing was dispatched.
    Notice(Notice),
}

impl RouteOutput {
    /// Text form of the output.
    pub fn text(&self) -> String {
        match self {
            RouteOutput::Text(text) | RouteOutput::Audio { text, .. } => text.clone(),
            RouteOutput::Notice(notice) => notice.message(),
        }
    }
}

/// Orchestrates rate limiting, memory, dispatch and voice for each message.
pub struct MessageRouter {
    limiter: RateLimiter,
    memory: ConversationMemory,
    sessions: SessionStore,
    dispatcher: ModelFallbackDispatcher,
    voice: VoiceSynthesisAdapter,
}

impl MessageRouter {
    /// Assemble a router from its parts.
    pub fn new(
        limiter: RateLimiter,
        memory: ConversationMemory,
        dispatcher: ModelFallbackDispatcher,
        voice: VoiceSynthesisAdapter,
    ) -> Self {
        Self {
            limiter,
            memory,
            sessions: SessionStore::new(),
            dispatcher,
            voice,
        }
    }

    /// Build a router from configuration.
    pub fn from_config(
        config: &RelayConfig,
        transport: Arc<dyn CompletionTransport>,
        voice: VoiceSynthesisAdapter,
    ) -> Self {
        let cache = Arc::new(ResponseCache::new(config.cache_capacity));
        Self::new(
            RateLimiter::new(config.cooldown),
            ConversationMemory::new(config.memory_limit),
            ModelFallbackDispatcher::new(config.backends.clone(), transport, cache),
            voice,
        )
    }

    /// Handle one inbound message from `user`.
    pub async fn route(&self, user: UserId, text: &str, now: DateTime<Utc>) -> RouteOutput {
        let text = text.trim();
        if text.is_empty() {
            return RouteOutput::Notice(Notice::EmptyMessage);
        }

        if !self.limiter.allow(user, now) {
            let retry_after = self.limiter.retry_after(user, now);
            debug!(user_id = %user, ?retry_after, "Rate limited");
            return RouteOutput::Notice(Notice::RateLimited { retry_after });
        }

        // Held from memory read to memory write so a user's turns never interleave.
        let turn_lock = self.sessions.turn_lock(user);
        let turn = turn_lock.lock().await;

        let session = self.sessions.get(user);
        let prompt = compose_prompt(&self.memory.read(user), text);

        let result = self
            .dispatcher
            .dispatch_from(session.selected_backend, &prompt, text)
            .await;
        info!(
            user_id = %user,
            backend = ?result.backend(),
            exhausted = result.is_exhausted(),
            "Message dispatched"
        );
        let reply = result.into_text();

        self.memory.append_turn(user, text, reply.clone());
        drop(turn);

        if session.voice_enabled {
            if let Some(artifact) = self.voice.synthesize(&reply).await {
                return RouteOutput::Audio { artifact, text: reply };
            }
        }

        RouteOutput::Text(reply)
    }

    /// Make `backend` the first one tried for `user`.
    ///
    /// # Errors
    /// Returns [`RelayError::BackendNotConfigured`] if it has no credentials.
    pub fn select_backend(&self, user: UserId, backend: BackendId) -> Result<()> {
        if !self.dispatcher.has_backend(backend) {
            return Err(RelayError::BackendNotConfigured(backend));
        }
        self.sessions.update(user, |s| s.selected_backend = Some(backend));
        info!(user_id = %user, backend = %backend, "Backend selected");
        Ok(())
    }

    /// Flip voice replies for `user`, returning the new setting.
    pub fn toggle_voice(&self, user: UserId) -> bool {
        let enabled = self.sessions.update(user, |s| {
            s.voice_enabled = !s.voice_enabled;
            s.voice_enabled
        });
        info!(user_id = %user, enabled, "Voice replies toggled");
        enabled
    }

    /// Forget the conversation with `user`.
    pub fn reset_memory(&self, user: UserId) {
        self.memory.clear(user);
        info!(user_id = %user, "Conversation memory cleared");
    }

    /// Current settings and counters for `user`.
    pub fn status(&self, user: UserId) -> SessionStatus {
        let session = self.sessions.get(user);
        SessionStatus {
            backend: session.selected_backend.or_else(|| self.dispatcher.primary()),
            backend_overridden: session.selected_backend.is_some(),
            voice_enabled: session.voice_enabled,
            voice_available: self.voice.is_available(),
            memory_entries: self.memory.len(user),
            memory_limit: self.memory.limit(),
            last_request: self.limiter.last_request(user),
        }
    }

    /// Configured backends in priority order.
    pub fn backends(&self) -> &[BackendDescriptor] {
        self.dispatcher.backends()
    }

    /// Conversation entries remembered for `user`.
    pub fn memory(&self, user: UserId) -> Vec<String> {
        self.memory.read(user)
    }

    /// The shared response cache.
    pub fn cache(&self) -> &ResponseCache {
        self.dispatcher.cache()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::error::BackendError;
    use crate::transport::fake::ScriptedTransport;
    use crate::voice::fake::{FailingSynthesizer, FixedSynthesizer, HangingSynthesizer};

    /// Numbers replies in call order; the first call is slow.
    #[derive(Default)]
    struct SlowFirstTransport {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionTransport for SlowFirstTransport {
        async fn complete(&self, _backend: &BackendDescriptor, prompt: &str) -> std::result::Result<String, BackendError> {
            let n = {
                let mut prompts = self.prompts.lock().unwrap();
                prompts.push(prompt.to_string());
                prompts.len()
            };
            if n == 1 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            Ok(format!("r{}", n))
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn router_with(transport: Arc<dyn CompletionTransport>, voice: VoiceSynthesisAdapter) -> MessageRouter {
        let config = RelayConfig::default()
            .with_backends(vec![
                BackendDescriptor::new(BackendId::Groq, "k", None).with_rank(1),
                BackendDescriptor::new(BackendId::OpenRouter, "k", None).with_rank(2),
            ])
            .with_cooldown(Duration::from_secs(3))
            .with_memory_limit(6);
        MessageRouter::from_config(&config, transport, voice)
    }

    fn router(transport: Arc<ScriptedTransport>) -> MessageRouter {
        router_with(transport, VoiceSynthesisAdapter::disabled())
    }

    #[tokio::test]
    async fn test_route_returns_reply_and_records_turn() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(BackendId::Groq, Ok("hi there"));
        let router = router(transport.clone());

        let output = router.route(UserId(1), "hello", at(0)).await;

        assert_eq!(output, RouteOutput::Text("hi there".into()));
        assert_eq!(router.memory(UserId(1)), vec!["hello", "hi there"]);
    }

    #[tokio::test]
    async fn test_rate_limited_call_changes_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(BackendId::Groq, Ok("first"));
        transport.push(BackendId::Groq, Ok("second"));
        let router = router(transport.clone());

        router.route(UserId(1), "hello", at(0)).await;
        let memory_before = router.memory(UserId(1));
        let cache_before = router.cache().len();

        let output = router.route(UserId(1), "again", at(1)).await;

        assert_eq!(
            output,
            RouteOutput::Notice(Notice::RateLimited {
                retry_after: Duration::from_secs(2)
            })
        );
        assert_eq!(router.memory(UserId(1)), memory_before);
        assert_eq!(router.cache().len(), cache_before);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_message_rejected_without_consuming_cooldown() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(BackendId::Groq, Ok("reply"));
        let router = router(transport.clone());

        let output = router.route(UserId(1), "   ", at(0)).await;
        assert_eq!(output, RouteOutput::Notice(Notice::EmptyMessage));
        assert_eq!(router.status(UserId(1)).last_request, None);

        let output = router.route(UserId(1), "hello", at(0)).await;
        assert_eq!(output.text(), "reply");
    }

    #[tokio::test]
    async fn test_prompt_includes_memory() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(BackendId::Groq, Ok("r1"));
        transport.push(BackendId::Groq, Ok("r2"));
        let router = router(transport.clone());

        router.route(UserId(1), "q1", at(0)).await;
        router.route(UserId(1), "q2", at(10)).await;

        let prompts: Vec<_> = transport.calls().into_iter().map(|(_, p)| p).collect();
        assert_eq!(prompts, vec!["q1".to_string(), "q1\nr1\nq2".to_string()]);
    }

    #[tokio::test]
    async fn test_selected_backend_tried_first() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(BackendId::OpenRouter, Ok("from openrouter"));
        let router = router(transport.clone());

        router.select_backend(UserId(1), BackendId::OpenRouter).unwrap();
        let output = router.route(UserId(1), "hello", at(0)).await;

        assert_eq!(output.text(), "from openrouter");
        assert_eq!(transport.calls()[0].0, BackendId::OpenRouter);
    }

    #[test]
    fn test_select_unconfigured_backend() {
        let router = router(Arc::new(ScriptedTransport::new()));
        assert_eq!(
            router.select_backend(UserId(1), BackendId::HuggingFace),
            Err(RelayError::BackendNotConfigured(BackendId::HuggingFace))
        );
        assert!(!router.status(UserId(1)).backend_overridden);
    }

    #[tokio::test]
    async fn test_voice_reply_when_enabled() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(BackendId::Groq, Ok("spoken"));
        let voice = VoiceSynthesisAdapter::new(Arc::new(FixedSynthesizer(PathBuf::from("/tmp/r.wav"))));
        let router = router_with(transport, voice);

        assert!(router.toggle_voice(UserId(1)));
        let output = router.route(UserId(1), "hello", at(0)).await;

        assert_eq!(
            output,
            RouteOutput::Audio {
                artifact: VoiceArtifact::new("/tmp/r.wav"),
                text: "spoken".into()
            }
        );
    }

    #[tokio::test]
    async fn test_voice_failure_falls_back_to_same_text() {
        let silent = Arc::new(ScriptedTransport::new());
        silent.push(BackendId::Groq, Ok("answer"));
        let silent_router = router(silent);
        let expected = silent_router.route(UserId(42), "hello", at(0)).await;

        let transport = Arc::new(ScriptedTransport::new());
        transport.push(BackendId::Groq, Ok("answer"));
        let router = router_with(transport, VoiceSynthesisAdapter::new(Arc::new(FailingSynthesizer)));
        router.toggle_voice(UserId(42));

        let output = router.route(UserId(42), "hello", at(0)).await;

        assert_eq!(output, expected);
        assert_eq!(output, RouteOutput::Text("answer".into()));
    }

    #[tokio::test]
    async fn test_hung_synthesis_falls_back_to_text() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push(BackendId::Groq, Ok("first"))
            .push(BackendId::Groq, Ok("second"));
        let voice = VoiceSynthesisAdapter::new(Arc::new(HangingSynthesizer))
            .with_timeout(Duration::from_millis(50));
        let router = router_with(transport, voice);
        router.toggle_voice(UserId(1));

        let first = tokio::time::timeout(Duration::from_secs(2), router.route(UserId(1), "hello", at(0))).await;
        assert_eq!(first.ok(), Some(RouteOutput::Text("first".into())));

        router.toggle_voice(UserId(1));
        let second = tokio::time::timeout(Duration::from_secs(2), router.route(UserId(1), "again", at(10))).await;
        assert_eq!(second.ok(), Some(RouteOutput::Text("second".into())));
    }

    #[tokio::test]
    async fn test_synthesis_does_not_hold_the_user_turn() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push(BackendId::Groq, Ok("first"))
            .push(BackendId::Groq, Ok("second"));
        let voice = VoiceSynthesisAdapter::new(Arc::new(HangingSynthesizer))
            .with_timeout(Duration::from_secs(60));
        let router = Arc::new(router_with(transport, voice));
        router.toggle_voice(UserId(1));

        let speaking = {
            let router = Arc::clone(&router);
            tokio::spawn(async move { router.route(UserId(1), "hello", at(0)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        router.toggle_voice(UserId(1));

        let second = tokio::time::timeout(Duration::from_secs(2), router.route(UserId(1), "again", at(10))).await;

        assert_eq!(second.ok(), Some(RouteOutput::Text("second".into())));
        assert_eq!(router.memory(UserId(1)), vec!["hello", "first", "again", "second"]);
        speaking.abort();
    }

    #[tokio::test]
    async fn test_same_user_turns_are_recorded_in_arrival_order() {
        let transport = Arc::new(SlowFirstTransport::default());
        let router = Arc::new(router_with(transport.clone(), VoiceSynthesisAdapter::disabled()));

        let first = {
            let router = Arc::clone(&router);
            tokio::spawn(async move { router.route(UserId(5), "q1", at(0)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = {
            let router = Arc::clone(&router);
            tokio::spawn(async move { router.route(UserId(5), "q2", at(10)).await })
        };

        assert_eq!(first.await.unwrap(), RouteOutput::Text("r1".into()));
        assert_eq!(second.await.unwrap(), RouteOutput::Text("r2".into()));
        assert_eq!(router.memory(UserId(5)), vec!["q1", "r1", "q2", "r2"]);
        assert_eq!(
            *transport.prompts.lock().unwrap(),
            vec!["q1".to_string(), "q1\nr1\nq2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_exhausted_reply_is_remembered() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(BackendId::Groq, Err(BackendError::Status(500)));
        transport.push(BackendId::OpenRouter, Err(BackendError::Timeout));
        let router = router(transport);

        let output = router.route(UserId(1), "explain", at(0)).await;

        assert_eq!(output.text(), crate::fallback::TERMINAL_MESSAGE);
        assert_eq!(router.memory(UserId(1)).len(), 2);
    }

    #[tokio::test]
    async fn test_reset_memory_and_status() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(BackendId::Groq, Ok("r"));
        let router = router(transport);

        router.route(UserId(1), "q", at(0)).await;
        let status = router.status(UserId(1));
        assert_eq!(status.memory_entries, 2);
        assert_eq!(status.memory_limit, 6);
        assert_eq!(status.backend, Some(BackendId::Groq));
        assert_eq!(status.last_request, Some(at(0)));
        assert!(!status.voice_enabled);
        assert!(!status.voice_available);

        router.reset_memory(UserId(1));
        assert_eq!(router.status(UserId(1)).memory_entries, 0);
    }

    #[tokio::test]
    async fn test_concurrent_users_do_not_block_each_other() {
        let transport = Arc::new(ScriptedTransport::new());
        for _ in 0..8 {
            transport.push(BackendId::Groq, Ok("ok"));
        }
        let router = Arc::new(router(transport.clone()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let router = Arc::clone(&router);
                tokio::spawn(async move { router.route(UserId(i), &format!("hello {}", i), at(0)).await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), RouteOutput::Text("ok".into()));
        }
        assert_eq!(transport.call_count(), 8);
    }

    #[test]
    fn test_notice_wording() {
        let notice = Notice::RateLimited {
            retry_after: Duration::from_millis(1500),
        };
        assert_eq!(notice.message(), "Please wait 2s before sending another message.");
        assert!(!Notice::EmptyMessage.message().is_empty());
    }
}
