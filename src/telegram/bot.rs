//! Bot construction and command parsing
//!
//! This module contains:
//! - Command enum definition
//! - Command token extraction from message text
//! - Bot instance creation and command menu registration

use reqwest::ClientBuilder;
use secrecy::{ExposeSecret, SecretString};
use strum::EnumString;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;

/// Bot commands enum with descriptions
///
/// `BotCommands` provides the menu shown in Telegram clients; `EnumString`
/// maps a bare command token (case-insensitive) to a variant, including the
/// legacy `/deno` alias.
#[derive(BotCommands, EnumString, Clone, Copy, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Command {
    #[command(description = "show the welcome message")]
    Start,
    #[command(description = "list available commands")]
    Help,
    #[command(description = "generate a new Deno project (owner only)")]
    #[strum(serialize = "generate", serialize = "deno")]
    Generate,
    #[command(description = "show the stored session (owner only)")]
    Session,
}

impl Command {
    /// Commands restricted to the configured owner.
    pub fn is_privileged(self) -> bool {
        matches!(self, Command::Generate | Command::Session)
    }
}

/// Extracts the command from message text
///
/// Accepts `/token`, `/token@botname` and trailing arguments. Returns `None`
/// for plain text and for tokens that map to no command.
///
/// # Example
///
/// ```
/// use denobot::telegram::bot::{parse_command, Command};
///
/// assert_eq!(parse_command("/deno@my_bot now"), Some(Command::Generate));
/// assert_eq!(parse_command("hello"), None);
/// ```
pub fn parse_command(text: &str) -> Option<Command> {
    let first = text.split_whitespace().next()?;
    let token = first.strip_prefix('/')?;
    let token = token.split_once('@').map_or(token, |(name, _)| name);
    if token.is_empty() {
        return None;
    }
    token.parse().ok()
}

/// Creates a Bot instance with a bounded HTTP timeout
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(reqwest::Error)` - HTTP client could not be built
pub fn create_bot(token: &SecretString) -> Result<Bot, reqwest::Error> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    Ok(Bot::with_client(token.expose_secret(), client))
}

/// Sets up bot commands in Telegram UI
///
/// # Returns
/// * `Ok(())` - Commands set successfully
/// * `Err(RequestError)` - Failed to set commands
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}
