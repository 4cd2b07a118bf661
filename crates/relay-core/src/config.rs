//! Relay configuration.
//!
//! Settings come from environment variables (the binary loads `.env` files
//! first). Paths follow the layout below:
//!
//! ```text
//! ~/.ai-relay/
//! ├── config/       # .env.local with tokens and API keys
//! └── cache/
//!     └── voice/    # Synthesized replies awaiting delivery
//! ```
//!
//! # Environment Variables
//!
//! Backends (at least one required):
//! - `GROQ_API_KEY`, `GROQ_MODEL`
//! - `OPENROUTER_API_KEY`, `OPENROUTER_MODEL`
//! - `HF_API_TOKEN`, `HF_MODEL`
//!
//! Tuning:
//! - `RELAY_BACKEND_ORDER`: comma-separated priority order
//! - `RELAY_BACKEND_TIMEOUT_SECS`: per-call timeout (default: 30)
//! - `RELAY_MEMORY_LIMIT`: remembered entries per user (default: 6)
//! - `RELAY_COOLDOWN_SECS`: minimum seconds between messages (default: 3)
//! - `RELAY_CACHE_CAPACITY`: cached responses, `0` for unbounded (default: 1024)
//! - `RELAY_TTS_COMMAND`: espeak-compatible program (default: espeak-ng)
//! - `RELAY_TTS_TIMEOUT_SECS`: give up on one synthesis after this long (default: 20)
//! - `RELAY_STATE_DIR`: override the base directory

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, info};

use crate::backend::{BackendDescriptor, BackendId};
use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::ConfigError;
use crate::limiter::DEFAULT_COOLDOWN;
use crate::memory::DEFAULT_MEMORY_LIMIT;
use crate::voice::{DEFAULT_TTS_COMMAND, DEFAULT_TTS_TIMEOUT};

/// Environment variable for a custom state directory.
pub const STATE_DIR_ENV: &str = "RELAY_STATE_DIR";

/// Environment variable listing the backend priority order.
pub const BACKEND_ORDER_ENV: &str = "RELAY_BACKEND_ORDER";

/// Environment variable for the per-call backend timeout.
pub const BACKEND_TIMEOUT_ENV: &str = "RELAY_BACKEND_TIMEOUT_SECS";

/// Environment variable for the memory window.
pub const MEMORY_LIMIT_ENV: &str = "RELAY_MEMORY_LIMIT";

/// Environment variable for the cooldown window.
pub const COOLDOWN_ENV: &str = "RELAY_COOLDOWN_SECS";

/// Environment variable for the cache capacity.
pub const CACHE_CAPACITY_ENV: &str = "RELAY_CACHE_CAPACITY";

/// Environment variable for the text-to-speech program.
pub const TTS_COMMAND_ENV: &str = "RELAY_TTS_COMMAND";

/// Environment variable for the synthesis timeout.
pub const TTS_TIMEOUT_ENV: &str = "RELAY_TTS_TIMEOUT_SECS";

/// Default state directory name under home.
const DEFAULT_STATE_DIR: &str = ".ai-relay";

/// Default per-call backend timeout.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Get the relay state directory.
///
/// 1. `RELAY_STATE_DIR` if set
/// 2. `~/.ai-relay` if a home directory is available
/// 3. `.ai-relay` in the current directory
pub fn state_dir() -> PathBuf {
    std::env::var(STATE_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(DEFAULT_STATE_DIR))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
        })
}

/// Get the user config directory.
pub fn config_dir() -> PathBuf {
    state_dir().join("config")
}

/// Get the `.env.local` file holding secrets.
pub fn env_file() -> PathBuf {
    config_dir().join(".env.local")
}

/// Get the directory for synthesized voice replies.
pub fn voice_dir() -> PathBuf {
    state_dir().join("cache").join("voice")
}

/// Environment variable holding the credential for `id`.
pub fn api_key_env(id: BackendId) -> &'static str {
    match id {
        BackendId::Groq => "GROQ_API_KEY",
        BackendId::OpenRouter => "OPENROUTER_API_KEY",
        BackendId::HuggingFace => "HF_API_TOKEN",
    }
}

/// Environment variable overriding the model for `id`.
pub fn model_env(id: BackendId) -> &'static str {
    match id {
        BackendId::Groq => "GROQ_MODEL",
        BackendId::OpenRouter => "OPENROUTER_MODEL",
        BackendId::HuggingFace => "HF_MODEL",
    }
}

/// Settings for the dispatch core.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Configured backends, ranked.
    pub backends: Vec<BackendDescriptor>,
    /// Remembered entries per user.
    pub memory_limit: usize,
    /// Minimum time between two accepted messages from one user.
    pub cooldown: Duration,
    /// Response cache capacity; `0` is unbounded.
    pub cache_capacity: usize,
    /// Text-to-speech program.
    pub tts_command: String,
    /// Upper bound on one synthesis.
    pub tts_timeout: Duration,
    /// Where voice artifacts are written.
    pub voice_dir: PathBuf,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            backends: Vec::new(),
            memory_limit: DEFAULT_MEMORY_LIMIT,
            cooldown: DEFAULT_COOLDOWN,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            tts_command: DEFAULT_TTS_COMMAND.to_string(),
            tts_timeout: DEFAULT_TTS_TIMEOUT,
            voice_dir: voice_dir(),
        }
    }
}

impl RelayConfig {
    /// Build the configuration from the process environment.
    ///
    /// # Errors
    /// Fails when no backend credential is set or a value cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let order = match var(BACKEND_ORDER_ENV) {
            Some(list) => parse_order(&list)?,
            None => BackendId::ALL.to_vec(),
        };

        let timeout = parse_or(var(BACKEND_TIMEOUT_ENV), BACKEND_TIMEOUT_ENV, DEFAULT_BACKEND_TIMEOUT.as_secs())?;
        let timeout = Duration::from_secs(timeout);

        let mut backends = Vec::new();
        for id in order {
            let Some(api_key) = var(api_key_env(id)) else {
                debug!(backend = %id, "No credential, backend disabled");
                continue;
            };
            let rank = backends.len() + 1;
            backends.push(
                BackendDescriptor::new(id, api_key, var(model_env(id)))
                    .with_rank(rank)
                    .with_timeout(timeout),
            );
        }

        if backends.is_empty() {
            return Err(ConfigError::NoBackends);
        }

        let defaults = Self::default();
        let config = Self {
            backends,
            memory_limit: parse_or(var(MEMORY_LIMIT_ENV), MEMORY_LIMIT_ENV, defaults.memory_limit)?,
            cooldown: Duration::from_secs(parse_or(
                var(COOLDOWN_ENV),
                COOLDOWN_ENV,
                defaults.cooldown.as_secs(),
            )?),
            cache_capacity: parse_or(var(CACHE_CAPACITY_ENV), CACHE_CAPACITY_ENV, defaults.cache_capacity)?,
            tts_command: var(TTS_COMMAND_ENV).unwrap_or(defaults.tts_command),
            tts_timeout: Duration::from_secs(parse_or(
                var(TTS_TIMEOUT_ENV),
                TTS_TIMEOUT_ENV,
                defaults.tts_timeout.as_secs(),
            )?),
            voice_dir: defaults.voice_dir,
        };

        info!(
            backends = ?config.backends.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(),
            memory_limit = config.memory_limit,
            cooldown_secs = config.cooldown.as_secs(),
            cache_capacity = config.cache_capacity,
            "Relay configuration loaded"
        );

        Ok(config)
    }

    /// Replace the backend list.
    pub fn with_backends(mut self, backends: Vec<BackendDescriptor>) -> Self {
        self.backends = backends;
        self
    }

    /// Set the memory window.
    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = limit;
        self
    }

    /// Set the cooldown window.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set the cache capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }
}

/// Parse a comma-separated backend list, dropping duplicates.
fn parse_order(list: &str) -> Result<Vec<BackendId>, ConfigError> {
    let mut order = Vec::new();
    for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let id = BackendId::from_str(name).map_err(|_| ConfigError::UnknownBackend {
            var: BACKEND_ORDER_ENV,
            name: name.to_string(),
        })?;
        if !order.contains(&id) {
            order.push(id);
        }
    }
    Ok(order)
}

fn parse_or<T: FromStr>(value: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue { var, value: raw }),
        None => Ok(default),
    }
}
