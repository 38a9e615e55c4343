use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info};
use url::Url;

use super::{NotificationSink, NotifyError};
use crate::game::GoalAlert;

/// Presses a Home Assistant webhook trigger. The automation behind the
/// webhook decides what a goal means; the request body is a placeholder.
pub struct HomeAssistantWebhook {
    http: Client,
    host: String,
    port: u16,
    url: Url,
    connect_timeout: Duration,
}

impl HomeAssistantWebhook {
    pub fn new(host: &str, port: u16, webhook_id: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let url = webhook_url(host, port, webhook_id)?;
        Ok(HomeAssistantWebhook {
            http,
            host: host.to_string(),
            port,
            url,
            connect_timeout: timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

fn webhook_url(host: &str, port: u16, webhook_id: &str) -> Result<Url> {
    let mut url = Url::parse(&format!("http://{}:{}/", host, port))
        .with_context(|| format!("Invalid Home Assistant host: {}", host))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Home Assistant URL cannot carry a path"))?
        .pop_if_empty()
        .extend(["api", "webhook", webhook_id]);
    Ok(url)
}

#[async_trait]
impl NotificationSink for HomeAssistantWebhook {
    fn name(&self) -> &str {
        "Home Assistant webhook"
    }

    async fn ready(&self) -> Result<(), NotifyError> {
        let unreachable = |reason: String| NotifyError::Unreachable {
            host: self.host.clone(),
            port: self.port,
            reason,
        };

        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(_)) => {
                debug!("{}:{} is reachable", self.host, self.port);
                Ok(())
            }
            Ok(Err(e)) => Err(unreachable(e.to_string())),
            Err(_) => Err(unreachable(format!(
                "timed out after {:?}",
                self.connect_timeout
            ))),
        }
    }

    async fn notify(&self, alert: &GoalAlert) -> Result<(), NotifyError> {
        info!(
            "Pressing webhook for team {} goal #{} (detected {})",
            alert.team_id,
            alert.score,
            alert.detected_at.format("%H:%M:%S")
        );

        let resp = self
            .http
            .post(self.url.clone())
            .json(&serde_json::json!({}))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(NotifyError::Status(resp.status()));
        }
        Ok(())
    }
}
