//! Test fixtures for E2E testing
//!
//! Provides TestEnvironment that sets up everything needed for E2E tests:
//! - Mock Telegram Bot API server
//! - Mock upstream generate service
//! - SQLite session store in a temporary directory

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use denobot::config::{StoreConfig, StoreKind};
use denobot::storage::{open_store, SessionStore};
use denobot::telegram::{HandlerDeps, TelegramReplier, UpdateDispatcher};
use denobot::upstream::HttpGenerateClient;
use denobot::SessionRecord;
use teloxide::prelude::*;
use tempfile::TempDir;
use wiremock::MockServer;

use super::helpers::{mount_send_message, OWNER_ID};

/// Complete test environment for E2E tests
///
/// # Example
/// ```ignore
/// let env = TestEnvironment::new().await;
/// env.dispatcher.dispatch(update).await;
/// let replies = env.sent_messages().await;
/// ```
pub struct TestEnvironment {
    /// Stands in for api.telegram.org
    pub telegram: MockServer,
    /// Stands in for the generate service
    pub upstream: MockServer,
    pub bot: Bot,
    pub store: Arc<dyn SessionStore>,
    pub dispatcher: UpdateDispatcher,
    _db_dir: TempDir,
}

impl TestEnvironment {
    pub async fn new() -> Self {
        Self::with_upstream_timeout(Duration::from_secs(5)).await
    }

    pub async fn with_upstream_timeout(timeout: Duration) -> Self {
        let telegram = MockServer::start().await;
        let upstream = MockServer::start().await;
        mount_send_message(&telegram).await;

        let bot = Bot::new("123456:TEST_TOKEN").set_api_url(telegram.uri().parse().unwrap());

        let db_dir = tempfile::tempdir().unwrap();
        let store = open_store(&StoreConfig {
            kind: StoreKind::Sqlite,
            database_path: db_dir.path().join("sessions.sqlite"),
            max_retries: 1,
        })
        .unwrap();

        let client = HttpGenerateClient::new(upstream.uri().parse().unwrap(), timeout).unwrap();
        let deps = HandlerDeps::new(
            Arc::new(TelegramReplier::new(bot.clone())),
            Arc::new(client),
            store.clone(),
            UserId(OWNER_ID),
        );

        Self {
            telegram,
            upstream,
            bot,
            store,
            dispatcher: UpdateDispatcher::new(deps),
            _db_dir: db_dir,
        }
    }

    pub async fn session(&self, user_id: u64) -> Option<SessionRecord> {
        self.store.read(&user_id.to_string()).await.unwrap()
    }

    /// Texts of all messages sent through the Bot API, in order.
    pub async fn sent_texts(&self) -> Vec<String> {
        super::helpers::sent_messages(&self.telegram)
            .await
            .iter()
            .map(|m| m["text"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// Requests the upstream mock received.
    pub async fn upstream_requests(&self) -> Vec<wiremock::Request> {
        self.upstream.received_requests().await.unwrap_or_default()
    }
}
