//! Telegram bot integration and handlers

pub mod bot;
pub mod dispatcher;
pub mod format;
pub mod handlers;
pub mod reply;

// Re-exports for convenience
pub use bot::{create_bot, parse_command, setup_bot_commands, Command};
pub use dispatcher::{DispatchOutcome, UpdateDispatcher};
pub use handlers::{CommandOutcome, HandlerDeps, InboundUpdate};
pub use reply::{Replier, ReplyError, TelegramReplier};
