//! ntfy notification transport.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::services::{Message, NotificationTransport};
use crate::utils::http;

/// Publishes messages to an ntfy topic.
#[derive(Debug, Clone)]
pub struct NtfyTransport {
    client: Client,
    topic_url: String,
}

impl NtfyTransport {
    pub fn new(topic_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: http::create_client(timeout_secs)?,
            topic_url: topic_url.into(),
        })
    }
}

#[async_trait]
impl NotificationTransport for NtfyTransport {
    async fn send(&self, message: &Message) -> Result<()> {
        let mut request = self
            .client
            .post(&self.topic_url)
            .header("Title", message.title.as_str())
            .body(message.body.clone().into_bytes());
        if !message.tags.is_empty() {
            request = request.header("Tags", message.tags.join(","));
        }

        let response = request.send().await.map_err(AppError::delivery)?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::delivery(format!("ntfy answered {status}")));
        }

        log::debug!("ntfy accepted '{}'", message.title);
        Ok(())
    }
}
