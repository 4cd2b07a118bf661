//! Telegram front end for the AI relay.
//!
//! Each text message is handed to a [`relay_core::MessageRouter`] and the
//! reply goes back as text, or as an audio file when the user turned voice on.
//!
//! # Environment Variables
//!
//! Required:
//! - `TELEGRAM_BOT_TOKEN`: Bot token from @BotFather
//! - At least one of `GROQ_API_KEY`, `OPENROUTER_API_KEY`, `HF_API_TOKEN`
//!
//! Optional:
//! - `WEBHOOK_URL`: Public base URL for webhook mode
//! - `PORT`: Webhook/health port (default: 10000)
//! - `RELAY_*`: Relay tuning, see [`relay_core::RelayConfig`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use relay_core::{HttpTransport, MessageRouter, RelayConfig, VoiceSynthesisAdapter};
//! use relay_telegram::TelegramBot;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayConfig::from_env()?;
//!     let router = MessageRouter::from_config(
//!         &config,
//!         Arc::new(HttpTransport::new()),
//!         VoiceSynthesisAdapter::disabled(),
//!     );
//!
//!     let bot = TelegramBot::new(Arc::new(router))?;
//!     bot.start_polling().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Commands
//!
//! - `/start` - Welcome message
//! - `/help` - Show available commands
//! - `/models` - List backends in fallback order
//! - `/model <name>` - Ask a backend first
//! - `/voice` - Toggle voice replies
//! - `/reset` - Forget the conversation
//! - `/status` - Show current settings

pub mod bot;
pub mod error;
pub mod handlers;
pub mod server;

pub use bot::TelegramBot;
pub use error::{Result, TelegramError};
pub use handlers::{split_message, Command};
pub use server::{health_router, HealthResponse};
