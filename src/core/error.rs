use thiserror::Error;

use crate::core::config::ConfigError;
use crate::storage::StoreError;
use crate::telegram::ReplyError;
use crate::upstream::UpstreamError;

/// Centralized error type for the application
///
/// Module-level errors convert into this enum so the binary edge can report
/// them uniformly. Inside the dispatcher most of these are recovered and
/// surfaced to the user as a reply instead.
///
/// # Example
///
/// ```no_run
/// use denobot::core::error::AppError;
///
/// fn report(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid configuration (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Session store unavailable or corrupted
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    /// Upstream generate service failures
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Failure to deliver a reply to Telegram
    #[error("Reply error: {0}")]
    Reply(#[from] ReplyError),

    /// Telegram API errors outside of replies (webhook registration, polling)
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// IO errors (binding the HTTP listener)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
