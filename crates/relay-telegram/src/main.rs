//! AI Relay Telegram bot binary.
//!
//! Start the bot with:
//! ```bash
//! TELEGRAM_BOT_TOKEN=xxx GROQ_API_KEY=xxx cargo run -p relay-telegram
//! ```

use std::sync::Arc;

use clap::Parser;
use relay_core::{config, HttpTransport, MessageRouter, RelayConfig, VoiceSynthesisAdapter};
use relay_telegram::{TelegramBot, TelegramError};
use tracing_subscriber::EnvFilter;

/// AI Relay - chat with several LLM backends from Telegram
#[derive(Parser, Debug)]
#[command(name = "relay-telegram")]
#[command(about = "Telegram bot relaying messages to LLM backends with fallback")]
struct Args {
    /// Use webhook mode (default: polling mode)
    #[arg(short, long)]
    webhook: bool,

    /// Public base URL for webhook mode
    #[arg(long, env = "WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Webhook and health port
    #[arg(short, long, env = "PORT", default_value = "10000")]
    port: u16,

    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Env files first so clap's env-backed args see them
    let env_path = config::env_file();
    if env_path.exists() {
        let _ = dotenvy::from_path(&env_path);
    }
    let _ = dotenvy::from_filename(".env.local")
        .or_else(|_| dotenvy::dotenv());

    let args = Args::parse();

    // Initialize logging based on verbosity
    let filter = match args.verbose {
        0 => "relay_telegram=info,relay_core=info,teloxide=warn",
        1 => "relay_telegram=debug,relay_core=debug,teloxide=info",
        2 => "relay_telegram=trace,relay_core=trace,teloxide=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = RelayConfig::from_env().map_err(TelegramError::from)?;

    let voice = VoiceSynthesisAdapter::from_command(&config.tts_command, config.voice_dir.clone())
        .with_timeout(config.tts_timeout);
    let router = MessageRouter::from_config(&config, Arc::new(HttpTransport::new()), voice);

    let bot = TelegramBot::new(Arc::new(router))?;

    match bot.get_me().await {
        Ok(username) => {
            tracing::info!(username = %username, "Bot initialized successfully");
            println!("\n[robot] AI Relay Telegram Bot");
            println!("   Bot: @{}", username);
            println!("   Mode: {}", if args.webhook { "webhook" } else { "polling" });
            println!(
                "   Backends: {}",
                config
                    .backends
                    .iter()
                    .map(|b| b.display_name.as_str())
                    .collect::<Vec<_>>()
                    .join(" -> ")
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get bot info");
            return Err(e.into());
        }
    }

    println!("\n[phone] Open Telegram and send /start to begin");
    println!("   Press Ctrl+C to stop\n");

    if args.webhook {
        let public_url = args
            .webhook_url
            .ok_or_else(|| TelegramError::WebhookFailed("WEBHOOK_URL not set".to_string()))?;
        bot.start_webhook(&public_url, args.port).await?;
    } else {
        bot.start_polling().await?;
    }

    Ok(())
}
