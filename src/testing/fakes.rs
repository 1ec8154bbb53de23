//! Recording replier and scripted upstream client

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use teloxide::types::ChatId;

use crate::telegram::reply::{Replier, ReplyError};
use crate::upstream::{GenerateClient, GenerateResult, UpstreamError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One reply captured by [`RecordingReplier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReply {
    pub chat_id: ChatId,
    pub text: String,
    pub html: bool,
}

/// [`Replier`] that stores every reply instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingReplier {
    sent: Mutex<Vec<SentReply>>,
}

impl RecordingReplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replies(&self) -> Vec<SentReply> {
        lock(&self.sent).clone()
    }

    pub fn texts(&self) -> Vec<String> {
        lock(&self.sent).iter().map(|r| r.text.clone()).collect()
    }

    pub fn replies_to(&self, chat_id: ChatId) -> Vec<SentReply> {
        lock(&self.sent)
            .iter()
            .filter(|r| r.chat_id == chat_id)
            .cloned()
            .collect()
    }

    fn push(&self, chat_id: ChatId, text: &str, html: bool) {
        lock(&self.sent).push(SentReply {
            chat_id,
            text: text.to_string(),
            html,
        });
    }
}

#[async_trait]
impl Replier for RecordingReplier {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), ReplyError> {
        self.push(chat_id, text, false);
        Ok(())
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<(), ReplyError> {
        self.push(chat_id, html, true);
        Ok(())
    }
}

/// Canned upstream behaviour.
#[derive(Debug, Clone)]
pub enum FakeResponse {
    Ok(GenerateResult),
    /// Non-2xx status
    Status(u16),
    /// Body that is not JSON
    NotJson,
    /// Panics inside the handler
    Panic,
}

impl FakeResponse {
    #[allow(clippy::panic)]
    fn into_result(self) -> Result<GenerateResult, UpstreamError> {
        match self {
            FakeResponse::Ok(result) => Ok(result),
            FakeResponse::Status(code) => Err(UpstreamError::Status(code)),
            FakeResponse::NotJson => match serde_json::from_str::<GenerateResult>("not json") {
                Ok(result) => Ok(result),
                Err(e) => Err(UpstreamError::Parse(e)),
            },
            FakeResponse::Panic => panic!("upstream fake asked to panic"),
        }
    }
}

/// [`GenerateClient`] that plays back a script, then repeats a fallback.
///
/// Tracks how many calls are in flight at once so tests can assert
/// serialization.
#[derive(Debug)]
pub struct FakeGenerateClient {
    script: Mutex<VecDeque<FakeResponse>>,
    fallback: FakeResponse,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeGenerateClient {
    pub fn always(response: FakeResponse) -> Self {
        Self::scripted(Vec::new(), response)
    }

    pub fn scripted(script: Vec<FakeResponse>, fallback: FakeResponse) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            delay: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        lock(&self.calls).len()
    }

    /// User ids passed to `generate`, in call order.
    pub fn user_ids(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Highest number of concurrent `generate` calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerateClient for FakeGenerateClient {
    async fn generate(&self, user_id: &str) -> Result<GenerateResult, UpstreamError> {
        lock(&self.calls).push(user_id.to_string());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = lock(&self.script).pop_front().unwrap_or_else(|| self.fallback.clone());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response.into_result()
    }
}
