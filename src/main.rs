use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;

use denobot::cli::{Cli, Commands};
use denobot::core::{init_logger, Config};
use denobot::storage::{open_store, SessionStore};
use denobot::telegram::{create_bot, setup_bot_commands, HandlerDeps, TelegramReplier, UpdateDispatcher};
use denobot::transport::{polling::run_long_polling, run_webhook};
use denobot::upstream::HttpGenerateClient;

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if configuration is missing or invalid, or if the store,
/// the bot, or the HTTP listener cannot be initialized.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Panics inside an update are caught by the dispatcher; this only makes sure they are logged.
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_default();
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_default();
        tracing::error!(%location, "Panic caught: {}", message);
    }));

    // Load environment variables from .env if present
    let _ = dotenv();

    init_logger()?;

    // Fail fast: nothing starts without credentials.
    let config = Config::load()?;

    match cli.command_or_default() {
        Commands::Run { webhook } => {
            tracing::info!(webhook, "Running bot");
            run_bot(config, webhook).await
        }
        Commands::Session { user_id } => show_session(&config, user_id.as_deref()).await,
        Commands::CheckConfig => {
            println!("Configuration OK");
            println!("  owner id:          {}", config.owner_id.0);
            println!("  upstream:          {}", config.external_service_url);
            println!("  port:              {}", config.port);
            println!("  session store:     {}", config.store.kind);
            println!(
                "  webhook url:       {}",
                config
                    .webhook
                    .url
                    .as_ref()
                    .map_or_else(|| "(not set)".to_string(), |u| u.to_string())
            );
            Ok(())
        }
    }
}

/// Wires store, upstream client and bot together, then runs the selected transport.
async fn run_bot(config: Config, webhook: bool) -> Result<()> {
    if webhook {
        // Check before any side effect on Telegram's side.
        config.require_webhook_url()?;
    }

    let store = open_store(&config.store)?;
    let upstream = HttpGenerateClient::new(config.external_service_url.clone(), config.upstream_timeout)?;
    tracing::info!(endpoint = %upstream.endpoint(), "Upstream configured");

    let bot = create_bot(&config.bot_token)?;
    if let Err(e) = setup_bot_commands(&bot).await {
        tracing::warn!("Failed to set bot commands: {}", e);
    }

    let deps = HandlerDeps::new(
        Arc::new(TelegramReplier::new(bot.clone())),
        Arc::new(upstream),
        store,
        config.owner_id,
    );
    let dispatcher = UpdateDispatcher::new(deps);

    if webhook {
        run_webhook(bot, &config, dispatcher).await?;
    } else {
        run_long_polling(bot, &config, dispatcher).await?;
    }

    tracing::info!("Bot stopped");
    Ok(())
}

/// Prints one session as JSON, or every user id that has one.
async fn show_session(config: &Config, user_id: Option<&str>) -> Result<()> {
    let store: Arc<dyn SessionStore> = open_store(&config.store)?;

    match user_id {
        Some(user_id) => match store.read(user_id).await? {
            Some(session) => println!("{}", serde_json::to_string_pretty(&session)?),
            None => println!("No session stored for user {}", user_id),
        },
        None => {
            let ids = store.list_user_ids().await?;
            if ids.is_empty() {
                println!("No sessions stored");
            }
            for id in ids {
                println!("{}", id);
            }
        }
    }

    Ok(())
}
