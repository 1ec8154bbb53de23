//! denobot - Telegram bot that proxies a "generate" command to an external service
//!
//! The bot forwards the owner's generate requests to one HTTP endpoint and
//! keeps per-user session state (auth cookie, organizations, dev URLs) in a
//! durable store.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, and logging
//! - `session`: Session records and the pure merge of upstream results
//! - `storage`: Session store trait, SQLite and in-memory backends, retry adapter
//! - `upstream`: Client for the external generate service
//! - `telegram`: Command parsing, handlers, and the per-user dispatcher
//! - `transport`: Webhook and long-polling bridges, health endpoint
//! - `testing`: Test doubles shared by unit and integration tests

pub mod cli;
pub mod core;
pub mod session;
pub mod storage;
pub mod telegram;
pub mod testing;
pub mod transport;
pub mod upstream;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, AppResult, Config};
pub use session::SessionRecord;
pub use storage::{open_store, SessionStore};
pub use telegram::{HandlerDeps, UpdateDispatcher};
