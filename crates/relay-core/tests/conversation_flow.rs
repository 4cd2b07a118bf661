//! End-to-end conversation through the public router API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use relay_core::{
    BackendDescriptor, BackendError, BackendId, CompletionTransport, MessageRouter, Notice,
    RelayConfig, RouteOutput, UserId, VoiceSynthesisAdapter, TERMINAL_MESSAGE,
};

/// Numbers its replies; the primary backend can be switched off.
struct CountingTransport {
    calls: AtomicUsize,
    primary_down: bool,
}

impl CountingTransport {
    fn new(primary_down: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            primary_down,
        }
    }
}

#[async_trait]
impl CompletionTransport for CountingTransport {
    async fn complete(&self, backend: &BackendDescriptor, _prompt: &str) -> Result<String, BackendError> {
        if self.primary_down && backend.rank == 1 {
            return Err(BackendError::Status(503));
        }
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("reply{} from {}", n, backend.id))
    }
}

/// Every call fails.
struct DeadTransport;

#[async_trait]
impl CompletionTransport for DeadTransport {
    async fn complete(&self, _backend: &BackendDescriptor, _prompt: &str) -> Result<String, BackendError> {
        Err(BackendError::Transport("connection refused".into()))
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn config(memory_limit: usize) -> RelayConfig {
    RelayConfig::default()
        .with_backends(vec![
            BackendDescriptor::new(BackendId::Groq, "g", None).with_rank(1),
            BackendDescriptor::new(BackendId::OpenRouter, "o", None).with_rank(2),
        ])
        .with_cooldown(Duration::from_secs(3))
        .with_memory_limit(memory_limit)
}

#[tokio::test]
async fn test_user_42_scenario() {
    let router = MessageRouter::from_config(
        &config(6),
        Arc::new(CountingTransport::new(false)),
        VoiceSynthesisAdapter::disabled(),
    );
    let user = UserId(42);

    let first = router.route(user, "hello", at(0)).await;
    assert_eq!(first, RouteOutput::Text("reply1 from groq".into()));
    assert_eq!(router.memory(user), vec!["hello", "reply1 from groq"]);

    let limited = router.route(user, "again", at(1)).await;
    assert!(matches!(limited, RouteOutput::Notice(Notice::RateLimited { .. })));
    assert_eq!(router.memory(user), vec!["hello", "reply1 from groq"]);

    let second = router.route(user, "again", at(4)).await;
    assert_eq!(second.text(), "reply2 from groq");
    assert_eq!(
        router.memory(user),
        vec!["hello", "reply1 from groq", "again", "reply2 from groq"]
    );
}

#[tokio::test]
async fn test_small_window_evicts_oldest() {
    let router = MessageRouter::from_config(
        &config(2),
        Arc::new(CountingTransport::new(false)),
        VoiceSynthesisAdapter::disabled(),
    );
    let user = UserId(42);

    router.route(user, "hello", at(0)).await;
    router.route(user, "again", at(4)).await;

    assert_eq!(router.memory(user), vec!["again", "reply2 from groq"]);
}

#[tokio::test]
async fn test_primary_outage_is_invisible() {
    let router = MessageRouter::from_config(
        &config(6),
        Arc::new(CountingTransport::new(true)),
        VoiceSynthesisAdapter::disabled(),
    );

    let output = router.route(UserId(7), "hello", at(0)).await;

    assert_eq!(output.text(), "reply1 from openrouter");
    assert!(!output.text().contains("503"));
}

#[tokio::test]
async fn test_total_outage_gives_terminal_message() {
    let router = MessageRouter::from_config(&config(6), Arc::new(DeadTransport), VoiceSynthesisAdapter::disabled());

    let output = router.route(UserId(7), "what is the capital of peru", at(0)).await;

    assert_eq!(output, RouteOutput::Text(TERMINAL_MESSAGE.to_string()));
    assert!(router.cache().is_empty());
}
