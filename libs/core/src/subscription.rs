use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

/// Completes the subscription handshake announced by a confirmation envelope.
#[async_trait]
pub trait SubscriptionConfirmer: Send + Sync {
    async fn confirm(&self, subscribe_url: &str) -> Result<()>;
}

/// Confirms by issuing a plain GET against the `SubscribeURL`.
pub struct HttpSubscriptionConfirmer {
    client: reqwest::Client,
}

impl HttpSubscriptionConfirmer {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build subscription http client")?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl SubscriptionConfirmer for HttpSubscriptionConfirmer {
    async fn confirm(&self, subscribe_url: &str) -> Result<()> {
        let response = self
            .client
            .get(subscribe_url)
            .send()
            .await
            .with_context(|| format!("GET {subscribe_url}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {status} from subscription endpoint: {body}");
        }
        info!(status = %status, "subscription confirmed");
        Ok(())
    }
}
