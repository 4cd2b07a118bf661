//! Main Telegram bot implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use relay_core::MessageRouter;
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tracing::{error, info, warn};

use crate::error::{Result, TelegramError};
use crate::handlers::{handle_command, handle_message, handle_unknown, Command};
use crate::server::health_router;

/// Path Telegram posts updates to in webhook mode.
pub const WEBHOOK_PATH: &str = "/webhook";

/// The Telegram bot for the relay.
pub struct TelegramBot {
    /// The teloxide bot instance.
    bot: Bot,
    /// Shared message router.
    router: Arc<MessageRouter>,
}

impl TelegramBot {
    /// Create a new TelegramBot instance.
    ///
    /// Requires `TELEGRAM_BOT_TOKEN` environment variable to be set.
    pub fn new(router: Arc<MessageRouter>) -> Result<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(TelegramError::NoToken)?;

        Ok(Self::with_token(token, router))
    }

    /// Create a TelegramBot with an explicit token.
    pub fn with_token(token: impl Into<String>, router: Arc<MessageRouter>) -> Self {
        Self {
            bot: Bot::new(token),
            router,
        }
    }

    /// Get the bot's username.
    pub async fn get_me(&self) -> Result<String> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| TelegramError::BotStartFailed(e.to_string()))?;
        Ok(me.username().to_string())
    }

    /// Start the bot in polling mode.
    pub async fn start_polling(&self) -> Result<()> {
        info!("Starting Telegram bot in polling mode...");

        // Polling fails while a webhook is registered
        if let Err(e) = self.bot.delete_webhook().await {
            warn!(error = %e, "Could not remove existing webhook");
        }

        info!("Bot is running! Send /start to begin.");

        Dispatcher::builder(self.bot.clone(), build_handler(Arc::clone(&self.router)))
            .default_handler(|upd| async move {
                warn!("Unhandled update: {:?}", upd);
            })
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }

    /// Start the bot in webhook mode.
    ///
    /// Registers `<public_url>/webhook` with Telegram and serves it, together
    /// with the health routes, on `0.0.0.0:<port>`.
    pub async fn start_webhook(&self, public_url: &str, port: u16) -> Result<()> {
        let url = webhook_url(public_url)?;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        info!(url = %url, %addr, "Starting Telegram bot in webhook mode...");

        let options = webhooks::Options::new(addr, url);
        let (listener, stop_flag, webhook_routes) = webhooks::axum_to_router(self.bot.clone(), options)
            .await
            .map_err(|e| TelegramError::WebhookFailed(e.to_string()))?;

        let app = webhook_routes.merge(health_router());
        let tcp = tokio::net::TcpListener::bind(addr).await?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(tcp, app)
                .with_graceful_shutdown(stop_flag)
                .await
            {
                error!(error = %e, "Webhook server failed");
            }
        });

        info!("Bot is running! Send /start to begin.");

        Dispatcher::builder(self.bot.clone(), build_handler(Arc::clone(&self.router)))
            .default_handler(|upd| async move {
                warn!("Unhandled update: {:?}", upd);
            })
            .enable_ctrlc_handler()
            .build()
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("An error from the webhook listener"),
            )
            .await;

        Ok(())
    }
}

/// Build the full webhook URL from the public base URL.
pub fn webhook_url(public_url: &str) -> Result<url::Url> {
    let base = public_url.trim().trim_end_matches('/');
    url::Url::parse(&format!("{}{}", base, WEBHOOK_PATH))
        .map_err(|e| TelegramError::WebhookFailed(format!("invalid WEBHOOK_URL {:?}: {}", public_url, e)))
}

/// Build the update handler tree shared by polling and webhook modes.
fn build_handler(router: Arc<MessageRouter>) -> UpdateHandler<teloxide::RequestError> {
    let router_for_commands = Arc::clone(&router);
    let router_for_messages = Arc::clone(&router);

    dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
                    let router = Arc::clone(&router_for_commands);
                    info!(chat_id = %msg.chat.id, "Command matched: {:?}", cmd);
                    async move { handle_command(bot, msg, cmd, router).await }
                }),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message| {
                    // Starts with / but didn't parse as a command
                    msg.text().map(|t| t.starts_with('/')).unwrap_or(false)
                })
                .endpoint(|bot: Bot, msg: Message| async move { handle_unknown(bot, msg).await }),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.text().is_some())
                .endpoint(move |bot: Bot, msg: Message| {
                    let router = Arc::clone(&router_for_messages);
                    async move { handle_message(bot, msg, router).await }
                }),
        )
}
