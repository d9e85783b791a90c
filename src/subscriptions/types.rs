//! Consumer-facing subscription types.

use super::subscription::Subscription;
use crate::error::{FeedError, Result};
use crate::routes::ContentIdentifier;
use crate::types::{ContentDigest, SessionToken};
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for feed fan-out.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Max buffered events per consumer before it is dropped.
    /// Default: 1000
    pub buffer_size: usize,

    /// Send the latest content snapshot to consumers attaching late.
    /// Default: true
    pub replay_latest: bool,

    /// Page size for list routes when the caller gives none.
    /// Default: 10
    pub default_event_count: u32,

    /// Length of the default date window.
    /// Default: 365
    pub default_window_days: i64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            replay_latest: true,
            default_event_count: 10,
            default_window_days: crate::routes::DEFAULT_WINDOW_DAYS,
        }
    }
}

impl FeedConfig {
    /// Load from JSON; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: FeedConfig = serde_json::from_str(json)?;
        if config.buffer_size == 0 {
            return Err(FeedError::InvalidOperation(
                "buffer_size must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Events delivered to a feed consumer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// The feed is live. Always the first event a consumer sees, and sent
    /// again after a successful reconnect.
    Connected { subscription_id: ContentDigest },

    /// A content snapshot or change, in transport order.
    ContentUpdate { content: serde_json::Value },

    /// The transport connection was lost.
    Disconnected,

    /// Re-opening the feed under a new session failed.
    ReconnectFailed { reason: String },

    /// The consumer was removed from fan-out.
    Dropped { reason: DropReason },
}

/// Why a consumer was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
}

/// Identifier of one attached consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConsumerId(pub u64);

/// Lifecycle phase of a registry entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedPhase {
    /// Waiting for the transport to confirm the feed.
    Opening,
    Active,
    /// Being re-opened under a new session.
    Reconnecting,
    /// Last owner released; transport close in flight.
    Closing,
}

/// Outcome of a reconnect pass.
#[derive(Clone, Debug)]
pub struct ReconnectSummary {
    pub session: SessionToken,
    pub reopened: Vec<ContentDigest>,
    pub failed: Vec<(ContentDigest, String)>,
}

/// One consumer's share of a feed.
///
/// Holds a shared [`Subscription`] and a private event stream. Dropping or
/// releasing the handle gives up this consumer's ownership; the feed is
/// torn down once no owner is left.
pub struct FeedHandle {
    consumer: ConsumerId,
    subscription: Option<Arc<Subscription>>,
    receiver: Option<Receiver<FeedEvent>>,
}

impl FeedHandle {
    pub(crate) fn new(
        consumer: ConsumerId,
        subscription: Arc<Subscription>,
        receiver: Receiver<FeedEvent>,
    ) -> Self {
        Self {
            consumer,
            subscription: Some(subscription),
            receiver: Some(receiver),
        }
    }

    pub fn consumer(&self) -> ConsumerId {
        self.consumer
    }

    /// Shared subscription, `None` once released.
    pub fn subscription(&self) -> Option<&Arc<Subscription>> {
        self.subscription.as_ref()
    }

    pub fn id(&self) -> Option<ContentDigest> {
        self.subscription.as_ref().map(|s| s.id())
    }

    pub fn identifier(&self) -> Option<&ContentIdentifier> {
        self.subscription.as_ref().map(|s| s.identifier())
    }

    pub fn is_released(&self) -> bool {
        self.subscription.is_none()
    }

    /// Give up this consumer's ownership. Idempotent and non-blocking.
    pub fn release(&mut self) {
        self.receiver = None;
        self.subscription = None;
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> std::result::Result<FeedEvent, RecvError> {
        match &self.receiver {
            Some(receiver) => receiver.recv(),
            None => Err(RecvError),
        }
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> std::result::Result<FeedEvent, TryRecvError> {
        match &self.receiver {
            Some(receiver) => receiver.try_recv(),
            None => Err(TryRecvError::Disconnected),
        }
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<FeedEvent, RecvTimeoutError> {
        match &self.receiver {
            Some(receiver) => receiver.recv_timeout(timeout),
            None => Err(RecvTimeoutError::Disconnected),
        }
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<FeedEvent> {
        match &self.receiver {
            Some(receiver) => receiver.try_iter().collect(),
            None => Vec::new(),
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for FeedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedHandle")
            .field("consumer", &self.consumer)
            .field("id", &self.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config = FeedConfig::from_json_str(r#"{"buffer_size": 16}"#).unwrap();
        assert_eq!(config.buffer_size, 16);
        assert!(config.replay_latest);
        assert_eq!(config.default_event_count, 10);
        assert_eq!(config.default_window_days, 365);
    }

    #[test]
    fn test_config_rejects_zero_buffer() {
        let result = FeedConfig::from_json_str(r#"{"buffer_size": 0}"#);
        assert!(matches!(result, Err(FeedError::InvalidOperation(_))));
    }

    #[test]
    fn test_event_serialization_tag() {
        let json = serde_json::to_value(FeedEvent::Disconnected).unwrap();
        assert_eq!(json["type"], "disconnected");
    }
}
