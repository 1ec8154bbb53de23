//! reqwest-backed [`GenerateClient`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::{GenerateClient, GenerateRequest, GenerateResult, UpstreamError};

/// Posts generate commands to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct HttpGenerateClient {
    http: Client,
    endpoint: Url,
}

impl HttpGenerateClient {
    /// Creates a client with its own connection pool and a per-request timeout.
    ///
    /// # Returns
    /// * `Ok(HttpGenerateClient)` - Client ready to use
    /// * `Err(UpstreamError::Transport)` - TLS backend could not be initialized
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("denobot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl GenerateClient for HttpGenerateClient {
    async fn generate(&self, user_id: &str) -> Result<GenerateResult, UpstreamError> {
        tracing::debug!(endpoint = %self.endpoint, user_id, "Calling generate service");

        // `.json()` sets `Content-Type: application/json`
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&GenerateRequest::new(user_id))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        // Read the body first so a malformed payload surfaces as a parse error,
        // not as a transport error.
        let body = response.text().await?;
        let result: GenerateResult = serde_json::from_str(&body)?;

        tracing::debug!(
            user_id,
            has_cookies = result.cookies().is_some(),
            has_org = result.org.is_some(),
            has_dev_url = result.dev_url.is_some(),
            "Generate service responded"
        );
        Ok(result)
    }
}
