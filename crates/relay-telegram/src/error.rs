//! Error types for the Telegram bot.

use thiserror::Error;

/// Errors that can occur in the Telegram bot.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Bot token not provided.
    #[error("Telegram bot token not set. Set TELEGRAM_BOT_TOKEN environment variable.")]
    NoToken,

    /// Failed to start the bot.
    #[error("Failed to start bot: {0}")]
    BotStartFailed(String),

    /// Webhook setup failed.
    #[error("Failed to register webhook: {0}")]
    WebhookFailed(String),

    /// Relay configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] relay_core::ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Telegram operations.
pub type Result<T> = std::result::Result<T, TelegramError>;
