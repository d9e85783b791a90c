//! Seam to the session/transport layer that actually opens feeds.

use crate::error::Result;
use crate::routes::{ContentIdentifier, WireContentIdentifier};
use crate::types::SessionToken;
use serde::{Deserialize, Serialize};

/// Opens and closes server-side feeds.
///
/// Implementations must tolerate `close_feed` after the connection is
/// already gone. Neither call is ever made while the registry lock is held.
pub trait Transport: Send + Sync {
    /// Token of the live session, `None` when disconnected.
    fn session_token(&self) -> Option<SessionToken>;

    /// Open a feed. Returning `Ok` confirms the feed is live.
    fn open_feed(&self, identifier: &ContentIdentifier, session: &SessionToken) -> Result<()>;

    /// Close a feed previously opened under `session`.
    fn close_feed(&self, identifier: &ContentIdentifier, session: &SessionToken) -> Result<()>;
}

/// Inbound traffic from the transport.
#[derive(Clone, Debug)]
pub enum TransportEvent {
    ContentUpdate {
        identifier: ContentIdentifier,
        content: serde_json::Value,
    },
    Disconnected,
}

/// Raw socket envelope carrying a change for one content id.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportMessage {
    pub content_id: WireContentIdentifier,
    #[serde(default)]
    pub change: serde_json::Value,
}

impl TransportMessage {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Decode the envelope's identifier with the strict route decoder.
    pub fn into_event(self) -> Result<TransportEvent> {
        Ok(TransportEvent::ContentUpdate {
            identifier: ContentIdentifier::try_from(self.content_id)?,
            content: self.change,
        })
    }
}
