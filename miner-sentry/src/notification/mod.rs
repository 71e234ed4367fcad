//! Notification system module.
//!
//! Alert and lifecycle events are rendered as Discord webhook messages.
//! Delivery is best-effort: one attempt per event, failures are logged.

pub mod channels;
pub mod events;
pub mod service;

pub use channels::{DiscordChannel, DiscordConfig, NotificationChannel};
pub use events::{NotificationEvent, NotificationPriority, ReadingSummary};
pub use service::{
    DiscardSink, NotificationService, NotificationSink, NotificationStats, RecordingSink,
};
