//! Notification sink boundary
//!
//! The sink exposes a single operation: rename a destination channel. The
//! production implementation talks to the Discord REST API over the shared
//! HTTP client; tests substitute a recording implementation.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::config::AgentConfig;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("destination {destination} rejected rename: HTTP {status}")]
    Rejected { destination: String, status: reqwest::StatusCode },
}

/// Rate-limited rename target. Implementations must treat every call as
/// independently fallible; the dispatcher handles pacing and skipping.
pub trait Sink {
    fn rename(
        &self,
        destination: &str,
        new_label: &str,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Discord channel rename via `PATCH /channels/{id}`.
#[derive(Clone)]
pub struct DiscordSink {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    timeout: Duration,
}

impl DiscordSink {
    pub fn new(client: reqwest::Client, config: &AgentConfig) -> Self {
        Self {
            client,
            api_base: config.discord_api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            timeout: config.sink_timeout,
        }
    }
}

impl Sink for DiscordSink {
    async fn rename(&self, destination: &str, new_label: &str) -> Result<(), SinkError> {
        let url = format!("{}/channels/{destination}", self.api_base);
        let response = self
            .client
            .patch(&url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&serde_json::json!({ "name": new_label }))
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SinkError::Rejected {
                destination: destination.to_string(),
                status: response.status(),
            });
        }

        debug!("renamed channel {destination} to {new_label:?}");
        Ok(())
    }
}
