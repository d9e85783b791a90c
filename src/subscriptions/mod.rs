//! Reference-counted live feed subscriptions.
//!
//! Many consumers can ask for the same content at once. The registry keeps
//! one transport feed per content id and hands every consumer its own
//! [`FeedHandle`] sharing a single [`Subscription`]:
//! - First subscribe opens the feed; later ones attach locally
//! - Updates fan out to every consumer in transport order
//! - The feed closes once the last owner is dropped
//! - Paged lists group pages under page 0 via associations
//!
//! # Example
//!
//! ```ignore
//! let registry = FeedRegistry::new(transport, FeedConfig::default())?;
//! let market = ContentIdentifier::new(ContentRoute::market("M1"));
//!
//! let card = registry.subscribe(market.clone())?;
//! let detail = registry.subscribe(market.clone())?; // no transport call
//!
//! loop {
//!     match card.recv() {
//!         Ok(FeedEvent::ContentUpdate { content }) => println!("odds: {content}"),
//!         Ok(FeedEvent::Disconnected) => println!("waiting for reconnect"),
//!         Ok(_) => {}
//!         Err(_) => break,
//!     }
//! }
//! ```

mod paginator;
mod registry;
mod subscription;
mod types;

pub use paginator::Paginator;
pub use registry::FeedRegistry;
pub use subscription::{Subscription, UnsubscriptionController};
pub use types::{
    ConsumerId, DropReason, FeedConfig, FeedEvent, FeedHandle, FeedPhase, ReconnectSummary,
};
