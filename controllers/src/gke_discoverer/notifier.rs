use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

/// Tells the monitoring system its configuration file changed.
#[async_trait]
pub trait ReloadNotifier: Send + Sync {
    async fn reload(&self) -> Result<()>;
}

/// Prometheus lifecycle API, `POST /-/reload`.
pub struct PrometheusReloader {
    client: Client,
    url: String,
}

impl PrometheusReloader {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            url: format!("{}/-/reload", endpoint.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl ReloadNotifier for PrometheusReloader {
    async fn reload(&self) -> Result<()> {
        self.client
            .post(&self.url)
            .header("Content-Type", "text/plain")
            .body("")
            .send()
            .await
            .with_context(|| format!("Failed to post {}", self.url))?;
        Ok(())
    }
}
