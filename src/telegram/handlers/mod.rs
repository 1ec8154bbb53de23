//! Command handlers
//!
//! Handlers receive the caller's session already loaded and mutate it in
//! place; persisting it is the dispatcher's job.

mod commands;
mod types;

pub use commands::handle_command;
pub use types::{CommandContext, CommandOutcome, HandlerDeps, InboundUpdate};
