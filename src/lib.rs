//! # Content Feeds
//!
//! Identity and lifecycle for live content feeds shared by many consumers.
//!
//! ## Core Concepts
//!
//! - **Routes**: What is requested and with which parameters
//! - **Identifiers**: SHA-256 keys for a route and for its paging family
//! - **Subscriptions**: Shared, reference-counted handles on one feed
//! - **Registry**: One transport feed per identifier, torn down with its
//!   last owner
//!
//! ## Example
//!
//! ```ignore
//! use content_feeds::{FeedClient, FeedConfig, FeedEvent};
//!
//! let client = FeedClient::new(transport, FeedConfig::default())?;
//!
//! // Two widgets, one market, one transport feed
//! let card = client.subscribe_market("M1")?;
//! let detail = client.subscribe_market("M1")?;
//!
//! // Route inbound socket traffic
//! client.handle_message(br#"{"contentId":{"type":"market","id":"M1"},"change":{}}"#)?;
//!
//! // Both release; the feed is closed once
//! drop(card);
//! drop(detail);
//! ```

pub mod client;
pub mod error;
pub mod routes;
pub mod subscriptions;
pub mod transport;
pub mod types;

// Re-exports
pub use client::FeedClient;
pub use error::{FeedError, Result};
pub use routes::{ContentIdentifier, ContentRoute, DateWindow, WireContentIdentifier};
pub use subscriptions::{
    ConsumerId, DropReason, FeedConfig, FeedEvent, FeedHandle, FeedPhase, FeedRegistry,
    Paginator, ReconnectSummary, Subscription, UnsubscriptionController,
};
pub use transport::{Transport, TransportEvent, TransportMessage};
pub use types::*;
