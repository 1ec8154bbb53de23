//! Handler types and dependencies

use std::sync::Arc;

use chrono::{DateTime, Utc};
use teloxide::types::{ChatId, Update, UpdateKind, UserId};

use crate::storage::SessionStore;
use crate::telegram::reply::Replier;
use crate::upstream::GenerateClient;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub replier: Arc<dyn Replier>,
    pub upstream: Arc<dyn GenerateClient>,
    pub store: Arc<dyn SessionStore>,
    /// The only user allowed to run privileged commands
    pub owner_id: UserId,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(
        replier: Arc<dyn Replier>,
        upstream: Arc<dyn GenerateClient>,
        store: Arc<dyn SessionStore>,
        owner_id: UserId,
    ) -> Self {
        Self {
            replier,
            upstream,
            store,
            owner_id,
        }
    }

    /// Sends plain text, logging instead of failing. A lost reply never aborts an update.
    pub async fn reply_text(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.replier.send_text(chat_id, text).await {
            tracing::warn!(chat_id = chat_id.0, error = %e, "Failed to send reply");
        }
    }

    /// HTML counterpart of [`HandlerDeps::reply_text`].
    pub async fn reply_html(&self, chat_id: ChatId, html: &str) {
        if let Err(e) = self.replier.send_html(chat_id, html).await {
            tracing::warn!(chat_id = chat_id.0, error = %e, "Failed to send HTML reply");
        }
    }
}

/// The parts of a Telegram update the dispatcher acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundUpdate {
    pub update_id: u32,
    /// Sender; channel posts and anonymous admins have none.
    pub user_id: Option<UserId>,
    pub chat_id: ChatId,
    pub text: Option<String>,
}

impl InboundUpdate {
    /// Extracts a message update. Returns `None` for every other update kind.
    pub fn from_update(update: &Update) -> Option<Self> {
        let msg = match &update.kind {
            UpdateKind::Message(msg) => msg,
            _ => return None,
        };

        Some(Self {
            update_id: update.id.0,
            user_id: msg.from.as_ref().map(|user| user.id),
            chat_id: msg.chat.id,
            text: msg.text().map(str::to_string),
        })
    }
}

/// Per-update view handed to a command handler.
pub struct CommandContext<'a> {
    pub deps: &'a HandlerDeps,
    pub user_id: UserId,
    pub chat_id: ChatId,
    /// Timestamp used for every record created while handling this update
    pub now: DateTime<Utc>,
}

impl CommandContext<'_> {
    pub fn is_owner(&self) -> bool {
        self.user_id == self.deps.owner_id
    }
}

/// What a command handler did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Informational reply sent, no state change
    Replied,
    /// Caller is not the owner; nothing else happened
    Denied,
    /// Upstream call succeeded and its result was merged into the session
    Generated,
    /// Upstream call failed; session left untouched
    UpstreamFailed,
}
