pub mod webhook;

pub use webhook::HomeAssistantWebhook;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::game::GoalAlert;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook returned {0}")]
    Status(StatusCode),
    #[error("{host}:{port} is unreachable: {reason}")]
    Unreachable {
        host: String,
        port: u16,
        reason: String,
    },
}

/// A downstream system that is told about each goal. Delivery is
/// fire-and-forget; callers log failures and move on.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Check that the target can be reached before a session starts.
    async fn ready(&self) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn notify(&self, alert: &GoalAlert) -> Result<(), NotifyError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
