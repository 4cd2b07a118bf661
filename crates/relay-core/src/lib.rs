//! Relay Core - the message dispatch core of the AI relay.
//!
//! Given "user U sent text T at time now", the core decides what to answer.
//! It is independent of any chat transport:
//!
//! - **limiter**: per-user cooldown gate
//! - **memory**: bounded per-user conversation log
//! - **cache**: memoized responses keyed by backend and composed prompt
//! - **dispatcher**: ordered fallback across inference backends
//! - **voice**: optional best-effort text-to-speech
//! - **router**: the per-message entry point and admin operations
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chrono::Utc;
//! use relay_core::{HttpTransport, MessageRouter, RelayConfig, UserId, VoiceSynthesisAdapter};
//!
//! # async fn run() -> Result<(), relay_core::ConfigError> {
//! let config = RelayConfig::from_env()?;
//! let router = MessageRouter::from_config(
//!     &config,
//!     Arc::new(HttpTransport::new()),
//!     VoiceSynthesisAdapter::disabled(),
//! );
//!
//! let output = router.route(UserId(42), "hello", Utc::now()).await;
//! println!("{}", output.text());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fallback;
pub mod limiter;
pub mod memory;
pub mod router;
pub mod session;
pub mod transport;
pub mod voice;

pub use backend::{extract_generated_text, BackendDescriptor, BackendFamily, BackendId};
pub use cache::{CacheKey, ResponseCache};
pub use config::{env_file, state_dir, voice_dir, RelayConfig};
pub use dispatcher::{DispatchResult, ModelFallbackDispatcher};
pub use error::{BackendError, ConfigError, RelayError, Result, SynthesisError};
pub use fallback::{FallbackReplies, TERMINAL_MESSAGE};
pub use limiter::RateLimiter;
pub use memory::{compose_prompt, ConversationMemory};
pub use router::{MessageRouter, Notice, RouteOutput};
pub use session::{SessionStatus, UserId, UserSession};
pub use transport::{CompletionTransport, HttpTransport};
pub use voice::{CommandSynthesizer, SpeechSynthesizer, VoiceArtifact, VoiceSynthesisAdapter};
