//! Notification service implementation.
//!
//! The NotificationService is responsible for:
//! - Resolving the current notification target from settings
//! - Dispatching events through the Discord channel
//! - Swallowing delivery failures after logging them

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::channels::{DiscordChannel, DiscordConfig, NotificationChannel};
use super::events::NotificationEvent;
use crate::Result;
use crate::config::ConfigService;

/// Best-effort delivery of notification events.
///
/// Implementations never fail the caller; errors are logged and dropped.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: NotificationEvent);
}

/// Sink that drops every event. Used where another process owns alerting.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

#[async_trait]
impl NotificationSink for DiscardSink {
    async fn notify(&self, event: NotificationEvent) {
        debug!("Notification suppressed in this process: {}", event.event_type());
    }
}

/// Sink that keeps events in memory, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, event: NotificationEvent) {
        self.events.lock().push(event);
    }
}

/// Delivery counters since process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationStats {
    pub sent: u64,
    pub failed: u64,
    /// Events dropped because no target is configured.
    pub skipped: u64,
}

/// Sends events to the webhook named in the current settings.
pub struct NotificationService {
    config: Arc<ConfigService>,
    client: reqwest::Client,
    sent: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl NotificationService {
    pub fn new(config: Arc<ConfigService>, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    fn channel_for(&self, target: &str) -> DiscordChannel {
        DiscordChannel::new(DiscordConfig::new(target), self.client.clone())
    }

    /// Send an event to the configured target, reporting the outcome.
    ///
    /// Returns `Ok(false)` when no target is configured.
    pub async fn dispatch(&self, event: &NotificationEvent) -> Result<bool> {
        let Some(target) = self.config.current().notification_target.clone() else {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(
                "No notification target configured, skipping {}",
                event.event_type()
            );
            return Ok(false);
        };

        match self.channel_for(&target).send(event).await {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                info!("Notification sent: {}", event.event_type());
                Ok(true)
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Send a test message to `target`, or to the configured target when `None`.
    pub async fn send_test(&self, target: Option<&str>) -> Result<()> {
        let target = match target.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => t.to_string(),
            None => self
                .config
                .current()
                .notification_target
                .clone()
                .ok_or_else(|| crate::Error::validation("no notification target configured"))?,
        };

        let channel = self.channel_for(&target);
        match channel.test().await {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                info!("Test notification sent via {}", channel.channel_type());
                Ok(())
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> NotificationStats {
        NotificationStats {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl NotificationSink for NotificationService {
    async fn notify(&self, event: NotificationEvent) {
        if let Err(e) = self.dispatch(&event).await {
            warn!("Failed to deliver {} notification: {}", event.event_type(), e);
        }
    }
}
