//! Inbound transports
//!
//! Updates reach the dispatcher either through an HTTP webhook or through a
//! long-polling loop. The modes are mutually exclusive and picked at startup;
//! both serve `GET /health`.

pub mod polling;
pub mod webhook;

pub use polling::{run_polling, UpdateFeed};
pub use webhook::{create_router, run_webhook, WebhookState, SECRET_TOKEN_HEADER};

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

/// Static body of the health endpoint.
pub const HEALTH_BODY: &str = "Bot is running";

/// GET /health
pub async fn health_handler() -> &'static str {
    HEALTH_BODY
}

/// Binds `0.0.0.0:port` and serves `app` until `shutdown` resolves.
pub async fn serve(port: u16, app: Router, shutdown: impl Future<Output = ()> + Send + 'static) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await
}

/// Resolves on Ctrl-C. A failure to install the handler is logged and treated as "never".
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
