//! Long-polling transport
//!
//! Fetches batches with `getUpdates` and submits every message update to the
//! dispatcher once, in the order received. The offset is advanced past each
//! batch so Telegram does not redeliver it.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::payloads::GetUpdatesSetters;
use teloxide::prelude::*;
use teloxide::types::Update;
use teloxide::RequestError;

use super::{create_router, serve, shutdown_signal};
use crate::core::config::{polling, Config};
use crate::core::error::AppResult;
use crate::telegram::{InboundUpdate, UpdateDispatcher};

/// Source of updates for the polling loop.
#[async_trait]
pub trait UpdateFeed: Send + Sync {
    /// Called once before the first fetch.
    async fn prepare(&self) -> Result<(), RequestError> {
        Ok(())
    }

    /// Updates with id >= `offset`, waiting up to `timeout_secs` for new ones.
    async fn fetch(&self, offset: i32, timeout_secs: u32) -> Result<Vec<Update>, RequestError>;
}

#[async_trait]
impl UpdateFeed for Bot {
    /// getUpdates is refused while a webhook is registered.
    async fn prepare(&self) -> Result<(), RequestError> {
        self.delete_webhook().await?;
        Ok(())
    }

    async fn fetch(&self, offset: i32, timeout_secs: u32) -> Result<Vec<Update>, RequestError> {
        self.get_updates().offset(offset).timeout(timeout_secs).await
    }
}

/// Exponential backoff delay after `consecutive_errors` failed fetches
fn error_backoff(consecutive_errors: u32) -> Duration {
    let secs = polling::EXPONENTIAL_BACKOFF_BASE
        .checked_pow(consecutive_errors)
        .unwrap_or(u64::MAX);
    Duration::from_secs(secs).min(polling::max_error_backoff())
}

/// Offset that acknowledges `update_id`. Never moves backwards, and ids outside
/// the `i32` range of getUpdates leave it unchanged.
fn next_offset(offset: i32, update_id: u32) -> i32 {
    i32::try_from(update_id).map_or(offset, |id| offset.max(id.saturating_add(1)))
}

/// Runs the polling loop until `shutdown` resolves
///
/// Submitted updates are not awaited; the dispatcher keeps per-user order.
/// Fetch errors are logged and retried with backoff, never fatal.
///
/// # Returns
/// * `Ok(())` - Shutdown requested
/// * `Err(RequestError)` - `prepare` failed
pub async fn run_polling<F>(
    feed: &F,
    dispatcher: &UpdateDispatcher,
    shutdown: impl Future<Output = ()>,
) -> Result<(), RequestError>
where
    F: UpdateFeed + ?Sized,
{
    feed.prepare().await?;
    tokio::pin!(shutdown);

    let mut offset: i32 = 0;
    let mut consecutive_errors: u32 = 0;
    tracing::info!("Long polling started");

    loop {
        let batch = tokio::select! {
            _ = &mut shutdown => break,
            batch = feed.fetch(offset, polling::LONG_POLL_TIMEOUT_SECS) => batch,
        };

        match batch {
            Ok(updates) => {
                consecutive_errors = 0;
                for update in updates {
                    offset = next_offset(offset, update.id.0);
                    match InboundUpdate::from_update(&update) {
                        Some(inbound) => {
                            // Outcome is logged by the mailbox.
                            drop(dispatcher.submit(inbound));
                        }
                        None => tracing::trace!(update_id = update.id.0, "Non-message update skipped"),
                    }
                }
            }
            Err(e) => {
                consecutive_errors = consecutive_errors.saturating_add(1);
                let delay = error_backoff(consecutive_errors);
                tracing::warn!(
                    error = %e,
                    attempt = consecutive_errors,
                    delay_secs = delay.as_secs(),
                    "getUpdates failed, backing off"
                );
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    tracing::info!("Long polling stopped");
    Ok(())
}

/// Polling mode: health endpoint on `PORT` plus the polling loop, until Ctrl-C
pub async fn run_long_polling(bot: Bot, config: &Config, dispatcher: UpdateDispatcher) -> AppResult<()> {
    let port = config.port;
    tokio::spawn(async move {
        if let Err(e) = serve(port, create_router(None), shutdown_signal()).await {
            tracing::error!("Health server failed: {}", e);
        }
    });

    run_polling(&bot, &dispatcher, shutdown_signal()).await?;
    Ok(())
}
