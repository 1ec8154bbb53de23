//! Outbound replies
//!
//! Handlers talk to Telegram only through [`Replier`], so tests can record
//! replies without a Bot API server.

use async_trait::async_trait;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("Telegram request failed: {0}")]
    Request(#[from] teloxide::RequestError),
}

#[async_trait]
pub trait Replier: Send + Sync {
    /// Sends plain text, no markup interpretation.
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), ReplyError>;

    /// Sends text rendered with Telegram's HTML parse mode. Callers escape dynamic parts.
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<(), ReplyError>;
}

/// [`Replier`] backed by the Bot API.
#[derive(Clone)]
pub struct TelegramReplier {
    bot: Bot,
}

impl TelegramReplier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Replier for TelegramReplier {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), ReplyError> {
        self.bot.send_message(chat_id, text).await?;
        Ok(())
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<(), ReplyError> {
        self.bot.send_message(chat_id, html).parse_mode(ParseMode::Html).await?;
        Ok(())
    }
}
