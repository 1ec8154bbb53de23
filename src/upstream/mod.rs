//! Client for the external project-generation service
//!
//! The bot delegates its privileged command to one fixed HTTP endpoint. The
//! service answers with any subset of a fresh auth cookie, a newly created
//! organization and a dev URL.

mod client;

pub use client::HttpGenerateClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Command name sent in every request body.
pub const GENERATE_COMMAND: &str = "generate";

/// Failures of a single generate call. All of them are recovered by the
/// command handler and shown to the user as the same generic message.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Non-2xx HTTP status
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    /// Connection, TLS or timeout failure
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body is not the expected JSON
    #[error("upstream response is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Request body posted to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest<'a> {
    pub command: &'a str,
    pub user_id: &'a str,
}

impl<'a> GenerateRequest<'a> {
    pub fn new(user_id: &'a str) -> Self {
        Self {
            command: GENERATE_COMMAND,
            user_id,
        }
    }
}

/// Decoded service response. Each field is independent; absence means
/// "leave that part of the session alone".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResult {
    #[serde(default)]
    pub cookies: Option<String>,
    #[serde(default)]
    pub org: Option<OrgPayload>,
    #[serde(default)]
    pub dev_url: Option<DevUrlPayload>,
}

impl GenerateResult {
    /// Cookie value worth storing (non-empty).
    pub fn cookies(&self) -> Option<&str> {
        self.cookies.as_deref().filter(|c| !c.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.cookies().is_none() && self.org.is_none() && self.dev_url.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrgPayload {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DevUrlPayload {
    pub url: String,
}

/// The one outbound call this bot makes.
#[async_trait]
pub trait GenerateClient: Send + Sync {
    async fn generate(&self, user_id: &str) -> Result<GenerateResult, UpstreamError>;
}
