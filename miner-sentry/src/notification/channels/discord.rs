//! Discord webhook notification channel.
//!
//! Every message is posted exactly once; failures, including Discord's 429
//! rate limit, are returned to the caller to be logged.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::{debug, warn};

use super::NotificationChannel;
use crate::notification::events::{NotificationEvent, NotificationPriority};
use crate::{Error, Result};

/// Discord channel configuration.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// Discord webhook URL.
    pub webhook_url: String,
    /// Optional username for the webhook.
    pub username: Option<String>,
    /// Optional avatar URL for the webhook.
    pub avatar_url: Option<String>,
}

impl DiscordConfig {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            ..Default::default()
        }
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            username: Some("Miner Sentry".to_string()),
            avatar_url: None,
        }
    }
}

/// Discord notification channel.
pub struct DiscordChannel {
    config: DiscordConfig,
    client: Client,
}

impl DiscordChannel {
    /// Create a channel sharing an existing HTTP client.
    pub fn new(config: DiscordConfig, client: Client) -> Self {
        Self { config, client }
    }

    /// Get the embed color based on priority.
    fn get_color(priority: NotificationPriority) -> u32 {
        match priority {
            NotificationPriority::Low => 0x808080,      // Gray
            NotificationPriority::Normal => 0x3498db,   // Blue
            NotificationPriority::High => 0xf39c12,     // Orange
            NotificationPriority::Critical => 0xe74c3c, // Red
        }
    }

    /// Build the webhook payload for an event.
    fn build_payload(&self, event: &NotificationEvent) -> serde_json::Value {
        let embed = json!({
            "title": event.title(),
            "color": Self::get_color(event.priority()),
            "timestamp": event.timestamp().to_rfc3339(),
            "footer": {
                "text": format!("Priority: {} | Type: {}", event.priority(), event.event_type())
            }
        });

        let mut payload = json!({
            "content": event.description(),
            "embeds": [embed]
        });

        if let Some(username) = &self.config.username {
            payload["username"] = json!(username);
        }
        if let Some(avatar_url) = &self.config.avatar_url {
            payload["avatar_url"] = json!(avatar_url);
        }

        payload
    }

    /// Post the payload once. A rate-limited (429) response is an ordinary failure.
    async fn post(&self, payload: &serde_json::Value) -> Result<()> {
        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::notification(format!("Discord request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            warn!("Discord rate limited the webhook (retry after {}s), dropping message", retry_after);
            return Err(Error::notification(format!(
                "Discord rate limited (retry after {}s)",
                retry_after
            )));
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::notification(format!(
            "Discord webhook failed: {} - {}",
            status, body
        )))
    }
}

#[async_trait]
impl NotificationChannel for DiscordChannel {
    fn channel_type(&self) -> &'static str {
        "discord"
    }

    fn is_enabled(&self) -> bool {
        !self.config.webhook_url.trim().is_empty()
    }

    async fn send(&self, event: &NotificationEvent) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let payload = self.build_payload(event);
        self.post(&payload).await?;

        debug!("Discord notification sent: {}", event.event_type());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::http::HeaderMap;
    use axum::response::IntoResponse;
    use axum::{Router, routing::post};
    use tokio::net::TcpListener;

    use crate::utils::http_client::build_client;

    fn client() -> Client {
        build_client(Duration::from_secs(5))
    }

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/hook")
    }

    /// Webhook stub answering every request with `status`, counting calls.
    async fn counting_hook(status: StatusCode) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let url = serve(Router::new().route(
            "/hook",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let mut headers = HeaderMap::new();
                    headers.insert("Retry-After", "0.05".parse().unwrap());
                    (status, headers).into_response()
                }
            }),
        ))
        .await;
        (url, calls)
    }

    #[test]
    fn test_get_color() {
        assert_eq!(
            DiscordChannel::get_color(NotificationPriority::Low),
            0x808080
        );
        assert_eq!(
            DiscordChannel::get_color(NotificationPriority::Critical),
            0xe74c3c
        );
    }

    #[test]
    fn test_empty_url_is_disabled() {
        let channel = DiscordChannel::new(DiscordConfig::default(), client());
        assert!(!channel.is_enabled());
    }

    #[test]
    fn test_build_payload() {
        let channel = DiscordChannel::new(DiscordConfig::new("https://example.com"), client());
        let payload = channel.build_payload(&NotificationEvent::startup("Monitor"));

        assert!(payload["content"].as_str().unwrap().contains("Monitor"));
        assert!(payload["embeds"].is_array());
        assert_eq!(payload["username"], "Miner Sentry");
        assert_eq!(
            payload["embeds"][0]["color"],
            DiscordChannel::get_color(NotificationPriority::Normal) as i64
        );
    }

    #[tokio::test]
    async fn test_success_is_sent_once() {
        let (url, calls) = counting_hook(StatusCode::NO_CONTENT).await;

        let channel = DiscordChannel::new(DiscordConfig::new(url), client());
        channel.test().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_is_not_retried() {
        let (url, calls) = counting_hook(StatusCode::TOO_MANY_REQUESTS).await;

        let channel = DiscordChannel::new(DiscordConfig::new(url), client());
        let err = channel.test().await.unwrap_err();
        assert!(matches!(err, Error::Notification(_)));
        assert!(err.to_string().contains("rate limited"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let (url, calls) = counting_hook(StatusCode::INTERNAL_SERVER_ERROR).await;

        let channel = DiscordChannel::new(DiscordConfig::new(url), client());
        let err = channel.test().await.unwrap_err();
        assert!(matches!(err, Error::Notification(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
