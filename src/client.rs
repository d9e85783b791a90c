//! Client facade: typed subscribe calls and inbound multiplexing.

use crate::error::Result;
use crate::routes::{ContentIdentifier, ContentRoute, DateWindow};
use crate::subscriptions::{FeedConfig, FeedHandle, FeedRegistry, Paginator, ReconnectSummary};
use crate::transport::{Transport, TransportEvent, TransportMessage};
use crate::types::EventListSort;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Entry point for consumers of live content.
///
/// Builds identifiers for each kind of request, deduplicates them through a
/// [`FeedRegistry`], and routes transport traffic to the matching feeds.
#[derive(Clone)]
pub struct FeedClient {
    registry: FeedRegistry,
}

impl FeedClient {
    pub fn new(transport: Arc<dyn Transport>, config: FeedConfig) -> Result<Self> {
        Ok(Self {
            registry: FeedRegistry::new(transport, config)?,
        })
    }

    pub fn registry(&self) -> &FeedRegistry {
        &self.registry
    }

    pub fn subscribe(&self, identifier: ContentIdentifier) -> Result<FeedHandle> {
        self.registry.subscribe(identifier)
    }

    pub fn subscribe_route(&self, route: ContentRoute) -> Result<FeedHandle> {
        self.registry.subscribe(ContentIdentifier::new(route))
    }

    pub fn subscribe_market(&self, market_id: &str) -> Result<FeedHandle> {
        self.subscribe_route(ContentRoute::market(market_id))
    }

    pub fn subscribe_outcome(&self, outcome_id: &str) -> Result<FeedHandle> {
        self.subscribe_route(ContentRoute::outcome(outcome_id))
    }

    pub fn subscribe_event_details(&self, event_id: &str) -> Result<FeedHandle> {
        self.subscribe_route(ContentRoute::event_details(event_id))
    }

    pub fn subscribe_event_live_data(&self, event_id: &str) -> Result<FeedHandle> {
        self.subscribe_route(ContentRoute::event_live_data(event_id))
    }

    pub fn subscribe_event_main_market(&self, event_id: &str) -> Result<FeedHandle> {
        self.subscribe_route(ContentRoute::event_main_market(event_id))
    }

    pub fn subscribe_event_secundary_markets(&self, event_id: &str) -> Result<FeedHandle> {
        self.subscribe_route(ContentRoute::event_secundary_markets(event_id))
    }

    pub fn subscribe_event_summary(&self, event_id: &str) -> Result<FeedHandle> {
        self.subscribe_route(ContentRoute::event_summary(event_id))
    }

    pub fn subscribe_event_group(&self, market_group_id: &str) -> Result<FeedHandle> {
        self.subscribe_route(ContentRoute::event_group(market_group_id))
    }

    pub fn subscribe_live_sports(&self) -> Result<FeedHandle> {
        self.subscribe_route(ContentRoute::LiveSports)
    }

    pub fn subscribe_pre_live_sports(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<FeedHandle> {
        let window = self.window(start, end);
        self.subscribe_route(ContentRoute::PreLiveSports { window })
    }

    /// Page 0 of the live events for a sport.
    pub fn live_events(&self, sport_id: &str) -> Result<Paginator> {
        Paginator::open(self.registry.clone(), ContentRoute::live_events(sport_id, 0))
    }

    /// Page 0 of the pre-live events for a sport.
    pub fn pre_live_events(
        &self,
        sport_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        event_count: Option<u32>,
        sort: EventListSort,
    ) -> Result<Paginator> {
        let route = ContentRoute::PreLiveEvents {
            sport_id: sport_id.to_string(),
            window: self.window(start, end),
            page_index: 0,
            event_count: event_count.unwrap_or(self.registry.config().default_event_count),
            sort,
        };
        Paginator::open(self.registry.clone(), route)
    }

    fn window(&self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> DateWindow {
        let span = self.registry.config().default_window_days;
        DateWindow::canonical_with_span(start, end, Utc::now(), span)
    }

    /// Route one transport event. Returns whether a live feed took it.
    pub fn handle_event(&self, event: TransportEvent) -> bool {
        match event {
            TransportEvent::ContentUpdate {
                identifier,
                content,
            } => self.registry.dispatch(&identifier, content),
            TransportEvent::Disconnected => {
                self.handle_disconnect();
                true
            }
        }
    }

    /// Decode a raw socket envelope and route it.
    pub fn handle_message(&self, bytes: &[u8]) -> Result<bool> {
        let event = TransportMessage::from_slice(bytes)?.into_event()?;
        Ok(self.handle_event(event))
    }

    /// Route a batch of raw envelopes in order. Malformed ones are skipped.
    pub fn handle_messages<'a>(&self, messages: impl IntoIterator<Item = &'a [u8]>) -> usize {
        messages
            .into_iter()
            .filter(|bytes| match self.handle_message(bytes) {
                Ok(routed) => routed,
                Err(e) => {
                    debug!(error = %e, "undecodable transport message skipped");
                    false
                }
            })
            .count()
    }

    pub fn handle_disconnect(&self) {
        self.registry.disconnect_all();
    }

    pub fn reconnect_if_needed(&self) -> Result<ReconnectSummary> {
        self.registry.reconnect_if_needed()
    }
}
