//! Command and message handlers for the Telegram bot.

use std::sync::Arc;

use chrono::Utc;
use relay_core::{BackendDescriptor, BackendId, MessageRouter, RouteOutput, SessionStatus, UserId};
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, ParseMode};
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

/// Telegram's per-message text limit, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Bot commands that can be invoked with /.
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot and get help")]
    Start,

    #[command(description = "Show help message")]
    Help,

    #[command(description = "List the AI backends in fallback order")]
    Models,

    #[command(description = "Ask a specific backend first: /model <groq|openrouter|huggingface>")]
    Model(String),

    #[command(description = "Turn voice replies on or off")]
    Voice,

    #[command(description = "Forget our conversation so far")]
    Reset,

    #[command(description = "Show your current settings")]
    Status,
}

/// The relay user a Telegram message belongs to.
///
/// Falls back to the chat id for messages without a sender (channel posts).
pub fn user_id(msg: &Message) -> UserId {
    msg.from
        .as_ref()
        .map(|u| UserId(u.id.0 as i64))
        .unwrap_or(UserId(msg.chat.id.0))
}

/// Handle the /start command.
pub async fn handle_start(bot: Bot, msg: Message, router: Arc<MessageRouter>) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, welcome_text(router.backends()))
        .parse_mode(ParseMode::Html)
        .await?;

    info!(chat_id = %msg.chat.id, user = ?msg.from.as_ref().map(|u| &u.username), "User started bot");
    Ok(())
}

/// Handle the /help command.
pub async fn handle_help(bot: Bot, msg: Message) -> ResponseResult<()> {
    let help_text = Command::descriptions().to_string();
    bot.send_message(msg.chat.id, help_text).await?;
    Ok(())
}

/// Handle the /models command.
pub async fn handle_models(bot: Bot, msg: Message, router: Arc<MessageRouter>) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, models_text(router.backends()))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle the /model command - select the backend tried first for this user.
pub async fn handle_model(
    bot: Bot,
    msg: Message,
    router: Arc<MessageRouter>,
    name: String,
) -> ResponseResult<()> {
    let reply = select_backend_reply(&router, user_id(&msg), &name);
    bot.send_message(msg.chat.id, reply)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle the /voice command.
pub async fn handle_voice(bot: Bot, msg: Message, router: Arc<MessageRouter>) -> ResponseResult<()> {
    let enabled = router.toggle_voice(user_id(&msg));
    bot.send_message(msg.chat.id, voice_reply(enabled, router.status(user_id(&msg)).voice_available))
        .await?;
    Ok(())
}

/// Handle the /reset command.
pub async fn handle_reset(bot: Bot, msg: Message, router: Arc<MessageRouter>) -> ResponseResult<()> {
    router.reset_memory(user_id(&msg));
    bot.send_message(msg.chat.id, "Conversation memory cleared. Let's start fresh.")
        .await?;
    Ok(())
}

/// Handle the /status command.
pub async fn handle_status(bot: Bot, msg: Message, router: Arc<MessageRouter>) -> ResponseResult<()> {
    let status = router.status(user_id(&msg));
    bot.send_message(msg.chat.id, status_text(&status))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle a plain text message: route it and deliver the reply.
pub async fn handle_message(bot: Bot, msg: Message, router: Arc<MessageRouter>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        debug!(chat_id = %msg.chat.id, "Ignoring non-text message");
        return Ok(());
    };

    let user = user_id(&msg);

    // Best effort; a failed chat action must not stop the reply
    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;

    match router.route(user, text, Utc::now()).await {
        RouteOutput::Text(reply) => send_text(&bot, msg.chat.id, &reply).await?,
        RouteOutput::Notice(notice) => {
            bot.send_message(msg.chat.id, notice.message()).await?;
        }
        RouteOutput::Audio { artifact, text } => {
            let upload = bot
                .send_audio(msg.chat.id, InputFile::file(artifact.path().to_path_buf()))
                .await;
            artifact.discard().await;
            if let Err(e) = upload {
                warn!(user_id = %user, error = %e, "Audio upload failed, sending text instead");
                send_text(&bot, msg.chat.id, &text).await?;
            }
        }
    }

    Ok(())
}

/// Reply to a /command that did not parse.
pub async fn handle_unknown(bot: Bot, msg: Message) -> ResponseResult<()> {
    if let Some(text) = msg.text() {
        info!(cmd = %text, "Unrecognized command");
        bot.send_message(msg.chat.id, unknown_command_text(text)).await?;
    }
    Ok(())
}

/// Dispatch commands to appropriate handlers.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    router: Arc<MessageRouter>,
) -> ResponseResult<()> {
    match cmd {
        Command::Start => handle_start(bot, msg, router).await,
        Command::Help => handle_help(bot, msg).await,
        Command::Models => handle_models(bot, msg, router).await,
        Command::Model(name) => handle_model(bot, msg, router, name).await,
        Command::Voice => handle_voice(bot, msg, router).await,
        Command::Reset => handle_reset(bot, msg, router).await,
        Command::Status => handle_status(bot, msg, router).await,
    }
}

async fn send_text(bot: &Bot, chat_id: ChatId, text: &str) -> ResponseResult<()> {
    for chunk in split_message(text, MAX_MESSAGE_CHARS) {
        bot.send_message(chat_id, chunk).await?;
    }
    Ok(())
}

/// Split `text` into chunks of at most `limit` characters.
///
/// Prefers breaking after a newline, then after a space, and only cuts a word
/// when a single line has no whitespace to break at.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > limit {
        let hard_end = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..hard_end];
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .map(|i| i + 1)
            .unwrap_or(hard_end);

        let chunk = rest[..cut].trim_end();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        rest = &rest[cut..];
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

fn welcome_text(backends: &[BackendDescriptor]) -> String {
    format!(
        "Welcome to AI Relay! 🤖\n\n\
        Just send me a message and I'll answer it.\n\n\
        <b>Backends:</b> {}\n\n\
        <b>Useful commands:</b>\n\
        - /model &lt;name&gt; to pick a backend\n\
        - /voice to get spoken replies\n\
        - /reset to forget the conversation\n\n\
        Type /help for all commands.",
        backends
            .iter()
            .map(|b| html_escape(&b.display_name))
            .collect::<Vec<_>>()
            .join(" → ")
    )
}

fn models_text(backends: &[BackendDescriptor]) -> String {
    let mut text = String::from("<b>Backends in fallback order:</b>\n");
    for backend in backends {
        text.push_str(&format!(
            "{}. {} (<code>{}</code>)\n",
            backend.rank,
            html_escape(&backend.display_name),
            backend.id
        ));
    }
    text.push_str("\nUse /model &lt;name&gt; to ask one of them first.");
    text
}

fn select_backend_reply(router: &MessageRouter, user: UserId, name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return "Please name a backend.\n\n<b>Usage:</b> <code>/model groq</code>\n\nSee /models for the list."
            .to_string();
    }

    let backend: BackendId = match name.parse() {
        Ok(backend) => backend,
        Err(_) => {
            return format!(
                "Unknown backend: <code>{}</code>\n\nSee /models for the list.",
                html_escape(name)
            )
        }
    };

    match router.select_backend(user, backend) {
        Ok(()) => format!("✅ {} will be asked first.", backend.display_name()),
        Err(e) => format!("❌ {}", html_escape(&e.to_string())),
    }
}

fn voice_reply(enabled: bool, available: bool) -> String {
    match (enabled, available) {
        (true, true) => "🔊 Voice replies are on.".to_string(),
        (true, false) => {
            "🔊 Voice replies are on, but speech synthesis isn't available here. You'll get text instead."
                .to_string()
        }
        (false, _) => "🔇 Voice replies are off.".to_string(),
    }
}

fn status_text(status: &SessionStatus) -> String {
    let backend = match status.backend {
        Some(b) if status.backend_overridden => format!("{} (selected)", b.display_name()),
        Some(b) => format!("{} (default)", b.display_name()),
        None => "none configured".to_string(),
    };
    let voice = match (status.voice_enabled, status.voice_available) {
        (true, true) => "✅ on",
        (true, false) => "⚠️ on (synthesis unavailable)",
        (false, _) => "❌ off",
    };
    let last_request = status
        .last_request
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());

    format!(
        "<b>Your settings</b>\n\n\
        - Backend: {}\n\
        - Voice: {}\n\
        - Memory: {}/{} entries\n\
        - Last message: {}",
        backend, voice, status.memory_entries, status.memory_limit, last_request
    )
}

fn unknown_command_text(text: &str) -> String {
    format!(
        "Unknown command: {}\n\nUse /help to see available commands.",
        text.split_whitespace().next().unwrap_or(text)
    )
}

/// Escape HTML special characters for Telegram HTML mode.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
