//! Webhook transport
//!
//! Telegram POSTs each update as JSON. The handler waits until the dispatcher
//! has finished the update, then acknowledges with 200. Anything but an
//! authentication failure is acknowledged so Telegram keeps delivering.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use secrecy::{ExposeSecret, SecretString};
use teloxide::payloads::SetWebhookSetters;
use teloxide::prelude::*;
use teloxide::types::Update;

use super::{health_handler, serve, shutdown_signal};
use crate::core::config::Config;
use crate::core::error::AppResult;
use crate::telegram::{InboundUpdate, UpdateDispatcher};

/// Header Telegram uses to echo the secret token given to `setWebhook`.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Webhook server state
#[derive(Clone)]
pub struct WebhookState {
    pub dispatcher: UpdateDispatcher,
    pub secret: Option<Arc<SecretString>>,
}

/// Builds the router: the webhook route when `webhook` is given, `/health` always.
pub fn create_router(webhook: Option<(&str, WebhookState)>) -> Router {
    let router = Router::new().route("/health", get(health_handler));
    match webhook {
        Some((path, state)) => router.merge(
            Router::new()
                .route(path, post(handle_webhook))
                .with_state(Arc::new(state)),
        ),
        None => router,
    }
}

fn secret_matches(expected: &SecretString, headers: &HeaderMap) -> bool {
    headers
        .get(SECRET_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|given| given == expected.expose_secret())
}

/// Handle incoming webhook
async fn handle_webhook(State(state): State<Arc<WebhookState>>, headers: HeaderMap, body: Bytes) -> StatusCode {
    if let Some(secret) = &state.secret {
        if !secret_matches(secret, &headers) {
            tracing::warn!("Webhook request with missing or wrong secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::error!("Failed to parse webhook body: {}", e);
            return StatusCode::OK;
        }
    };

    let Some(inbound) = InboundUpdate::from_update(&update) else {
        tracing::debug!(update_id = update.id.0, "Non-message update ignored");
        return StatusCode::OK;
    };

    let outcome = state.dispatcher.dispatch(inbound).await;
    tracing::debug!(update_id = update.id.0, ?outcome, "Webhook update handled");
    StatusCode::OK
}

/// Registers the webhook with Telegram and serves it until Ctrl-C
///
/// The webhook is deleted again on shutdown so a later polling run starts clean.
pub async fn run_webhook(bot: Bot, config: &Config, dispatcher: UpdateDispatcher) -> AppResult<()> {
    let url = config.require_webhook_url()?.clone();
    let secret = config
        .webhook
        .secret
        .as_ref()
        .map(|s| Arc::new(SecretString::from(s.expose_secret().to_string())));

    let mut request = bot.set_webhook(url.clone());
    if let Some(secret) = &secret {
        request = request.secret_token(secret.expose_secret().to_string());
    }
    request.await?;
    tracing::info!(url = %url, path = %config.webhook.path, "Webhook registered");

    let state = WebhookState { dispatcher, secret };
    let app = create_router(Some((config.webhook.path.as_str(), state)));
    let served = serve(config.port, app, shutdown_signal()).await;

    if let Err(e) = bot.delete_webhook().await {
        tracing::warn!("Failed to delete webhook on shutdown: {}", e);
    } else {
        tracing::info!("Webhook deleted");
    }

    served?;
    Ok(())
}
