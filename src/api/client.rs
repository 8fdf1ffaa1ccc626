use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, info};

use super::sse::{decode_frame, SseParser};
use super::{Account, NewStatus, Network, Status, StreamEvent};

/// REST + streaming client bound to one instance and access token
pub struct MastodonClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl MastodonClient {
    pub fn new(base_url: &str, access_token: &str) -> Result<Self> {
        // No overall request timeout: the streaming response stays open for hours.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Mastodon API error ({}): {}", status, error_body);
        }
        Ok(response)
    }
}

#[async_trait]
impl Network for MastodonClient {
    async fn verify_credentials(&self) -> Result<Account> {
        let url = self.url("/api/v1/accounts/verify_credentials");
        debug!("Fetching own account: {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Failed to send account request")?;

        Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse account response")
    }

    async fn stream_user(&self) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = self.url("/api/v1/streaming/user");
        info!("Connecting to user stream: {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .context("Failed to connect to user stream")?;
        let response = Self::check(response).await?;

        let mut parser = SseParser::new();
        let events = response
            .bytes_stream()
            .map(move |chunk| -> Vec<Result<StreamEvent>> {
                match chunk {
                    Ok(bytes) => parser
                        .feed(&bytes)
                        .iter()
                        .filter_map(decode_frame)
                        .map(Ok)
                        .collect(),
                    Err(e) => vec![Err(anyhow::Error::new(e).context("Stream read failed"))],
                }
            })
            .flat_map(futures::stream::iter)
            .boxed();

        Ok(events)
    }

    async fn post_status(&self, status: &NewStatus) -> Result<Status> {
        let url = self.url("/api/v1/statuses");
        debug!(
            "Posting status ({} chars, visibility {}, in reply to {:?})",
            status.status.chars().count(),
            status.visibility,
            status.in_reply_to_id
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(status)
            .send()
            .await
            .context("Failed to send status")?;

        Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse status response")
    }
}
