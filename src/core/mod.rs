//! Core configuration, errors, and logging

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{Config, ConfigError};
pub use error::{AppError, AppResult};
pub use logging::init_logger;
