//! Content routes: the parameters that reproduce one exact request.

use super::window::{parse_bound, DateWindow};
use crate::error::{FeedError, Result};
use crate::types::{ContentType, EventListSort};
use chrono::{DateTime, Utc};

const SEPARATOR: char = '/';

/// What is requested and with which parameters.
///
/// Routes are immutable values. Every field that distinguishes one request
/// from another is part of [`ContentRoute::full_route`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContentRoute {
    /// `sport/page`
    LiveEvents { sport_id: String, page_index: u32 },
    /// `sport/start/end/page/count/sort`
    PreLiveEvents {
        sport_id: String,
        window: DateWindow,
        page_index: u32,
        event_count: u32,
        sort: EventListSort,
    },
    /// Empty route.
    LiveSports,
    /// `start/end`
    PreLiveSports { window: DateWindow },
    EventDetails { event_id: String },
    /// Score and clock of one live event.
    EventDetailsLiveData { event_id: String },
    EventMainMarket { event_id: String },
    EventSecundaryMarkets { event_id: String },
    EventGroup { market_group_id: String },
    EventSummary { event_id: String },
    Market { market_id: String },
    Outcome { outcome_id: String },
}

impl ContentRoute {
    /// Pre-live event list with dates canonicalized against the current clock.
    ///
    /// Constructors accept any id. Ids that are empty or contain `/` fail
    /// [`ContentRoute::validate`] and are refused by the registry.
    pub fn pre_live_events(
        sport_id: impl Into<String>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        page_index: u32,
        event_count: u32,
        sort: EventListSort,
    ) -> Self {
        ContentRoute::PreLiveEvents {
            sport_id: sport_id.into(),
            window: DateWindow::canonical(start, end),
            page_index,
            event_count,
            sort,
        }
    }

    pub fn live_events(sport_id: impl Into<String>, page_index: u32) -> Self {
        ContentRoute::LiveEvents {
            sport_id: sport_id.into(),
            page_index,
        }
    }

    pub fn pre_live_sports(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        ContentRoute::PreLiveSports {
            window: DateWindow::canonical(start, end),
        }
    }

    pub fn event_details(event_id: impl Into<String>) -> Self {
        ContentRoute::EventDetails {
            event_id: event_id.into(),
        }
    }

    pub fn event_live_data(event_id: impl Into<String>) -> Self {
        ContentRoute::EventDetailsLiveData {
            event_id: event_id.into(),
        }
    }

    pub fn event_main_market(event_id: impl Into<String>) -> Self {
        ContentRoute::EventMainMarket {
            event_id: event_id.into(),
        }
    }

    pub fn event_secundary_markets(event_id: impl Into<String>) -> Self {
        ContentRoute::EventSecundaryMarkets {
            event_id: event_id.into(),
        }
    }

    pub fn event_group(market_group_id: impl Into<String>) -> Self {
        ContentRoute::EventGroup {
            market_group_id: market_group_id.into(),
        }
    }

    pub fn event_summary(event_id: impl Into<String>) -> Self {
        ContentRoute::EventSummary {
            event_id: event_id.into(),
        }
    }

    pub fn market(market_id: impl Into<String>) -> Self {
        ContentRoute::Market {
            market_id: market_id.into(),
        }
    }

    pub fn outcome(outcome_id: impl Into<String>) -> Self {
        ContentRoute::Outcome {
            outcome_id: outcome_id.into(),
        }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            ContentRoute::LiveEvents { .. } => ContentType::LiveEvents,
            ContentRoute::PreLiveEvents { .. } => ContentType::PreLiveEvents,
            ContentRoute::LiveSports => ContentType::LiveSports,
            ContentRoute::PreLiveSports { .. } => ContentType::PreLiveSports,
            ContentRoute::EventDetails { .. } => ContentType::EventDetails,
            ContentRoute::EventDetailsLiveData { .. } => ContentType::EventDetailsLiveData,
            ContentRoute::EventMainMarket { .. } => ContentType::EventMainMarket,
            ContentRoute::EventSecundaryMarkets { .. } => ContentType::EventSecundaryMarkets,
            ContentRoute::EventGroup { .. } => ContentType::EventGroup,
            ContentRoute::EventSummary { .. } => ContentType::EventSummary,
            ContentRoute::Market { .. } => ContentType::Market,
            ContentRoute::Outcome { .. } => ContentType::Outcome,
        }
    }

    /// Route string identifying this exact page or variant.
    pub fn full_route(&self) -> String {
        match self {
            ContentRoute::LiveEvents {
                sport_id,
                page_index,
            } => format!("{sport_id}/{page_index}"),
            ContentRoute::PreLiveEvents {
                sport_id,
                window,
                page_index,
                event_count,
                sort,
            } => format!(
                "{sport_id}/{}/{page_index}/{event_count}/{sort}",
                window.route_segment()
            ),
            ContentRoute::LiveSports => String::new(),
            ContentRoute::PreLiveSports { window } => window.route_segment(),
            _ => self.singleton_id().unwrap_or_default().to_string(),
        }
    }

    /// Route string identifying the paging family (page index stripped).
    ///
    /// Non-paged routes are their own family.
    pub fn pageable_route(&self) -> String {
        match self {
            ContentRoute::LiveEvents { sport_id, .. } => sport_id.clone(),
            ContentRoute::PreLiveEvents {
                sport_id,
                window,
                event_count,
                sort,
                ..
            } => format!("{sport_id}/{}/{event_count}/{sort}", window.route_segment()),
            _ => self.full_route(),
        }
    }

    /// Requested page size, where the route has one.
    pub fn event_count(&self) -> Option<u32> {
        match self {
            ContentRoute::PreLiveEvents { event_count, .. } => Some(*event_count),
            _ => None,
        }
    }

    pub fn page_index(&self) -> Option<u32> {
        match self {
            ContentRoute::LiveEvents { page_index, .. }
            | ContentRoute::PreLiveEvents { page_index, .. } => Some(*page_index),
            _ => None,
        }
    }

    /// Same route pointing at another page. `None` for non-paged routes.
    pub fn with_page_index(&self, page: u32) -> Option<Self> {
        let mut next = self.clone();
        match &mut next {
            ContentRoute::LiveEvents { page_index, .. }
            | ContentRoute::PreLiveEvents { page_index, .. } => {
                *page_index = page;
                Some(next)
            }
            _ => None,
        }
    }

    fn singleton_id(&self) -> Option<&str> {
        match self {
            ContentRoute::EventDetails { event_id }
            | ContentRoute::EventDetailsLiveData { event_id }
            | ContentRoute::EventMainMarket { event_id }
            | ContentRoute::EventSecundaryMarkets { event_id }
            | ContentRoute::EventSummary { event_id } => Some(event_id),
            ContentRoute::EventGroup { market_group_id } => Some(market_group_id),
            ContentRoute::Market { market_id } => Some(market_id),
            ContentRoute::Outcome { outcome_id } => Some(outcome_id),
            _ => None,
        }
    }

    /// Check that the route decodes back to itself.
    ///
    /// Ids and sport ids must be non-empty and must not contain `/`.
    pub fn validate(&self) -> Result<()> {
        let route = self.full_route();
        if Self::parse(self.content_type(), &route)? != *self {
            return Err(FeedError::malformed(
                self.content_type(),
                &route,
                "route does not decode to itself",
            ));
        }
        Ok(())
    }

    /// Strict decode of a full route string for the given content type.
    ///
    /// Wrong arity or an unparsable token is an error; nothing is defaulted.
    pub fn parse(content_type: ContentType, route: &str) -> Result<Self> {
        let fields = RouteFields::split(content_type, route);

        match content_type {
            ContentType::LiveEvents => {
                let [sport, page] = fields.exact::<2>()?;
                Ok(ContentRoute::LiveEvents {
                    sport_id: fields.id(sport, "sport id")?,
                    page_index: fields.number(page, "page index")?,
                })
            }
            ContentType::PreLiveEvents => {
                let [sport, start, end, page, count, sort] = fields.exact::<6>()?;
                Ok(ContentRoute::PreLiveEvents {
                    sport_id: fields.id(sport, "sport id")?,
                    window: fields.window(start, end)?,
                    page_index: fields.number(page, "page index")?,
                    event_count: fields.number(count, "event count")?,
                    sort: EventListSort::from_token(sort).ok_or_else(|| {
                        fields.error(format!("unknown sort type {sort:?}"))
                    })?,
                })
            }
            ContentType::LiveSports => {
                if route.is_empty() {
                    Ok(ContentRoute::LiveSports)
                } else {
                    Err(fields.error("live sports route takes no parameters"))
                }
            }
            ContentType::PreLiveSports => {
                let [start, end] = fields.exact::<2>()?;
                Ok(ContentRoute::PreLiveSports {
                    window: fields.window(start, end)?,
                })
            }
            ContentType::EventDetails => Ok(ContentRoute::EventDetails {
                event_id: fields.singleton("event id")?,
            }),
            ContentType::EventDetailsLiveData => Ok(ContentRoute::EventDetailsLiveData {
                event_id: fields.singleton("event id")?,
            }),
            ContentType::EventMainMarket => Ok(ContentRoute::EventMainMarket {
                event_id: fields.singleton("event id")?,
            }),
            ContentType::EventSecundaryMarkets => Ok(ContentRoute::EventSecundaryMarkets {
                event_id: fields.singleton("event id")?,
            }),
            ContentType::EventGroup => Ok(ContentRoute::EventGroup {
                market_group_id: fields.singleton("market group id")?,
            }),
            ContentType::EventSummary => Ok(ContentRoute::EventSummary {
                event_id: fields.singleton("event id")?,
            }),
            ContentType::Market => Ok(ContentRoute::Market {
                market_id: fields.singleton("market id")?,
            }),
            ContentType::Outcome => Ok(ContentRoute::Outcome {
                outcome_id: fields.singleton("outcome id")?,
            }),
        }
    }
}

/// Slash-separated fields of a route being decoded.
struct RouteFields<'a> {
    content_type: ContentType,
    route: &'a str,
    parts: Vec<&'a str>,
}

impl<'a> RouteFields<'a> {
    fn split(content_type: ContentType, route: &'a str) -> Self {
        Self {
            content_type,
            route,
            parts: route.split(SEPARATOR).collect(),
        }
    }

    fn error(&self, reason: impl Into<String>) -> FeedError {
        FeedError::malformed(self.content_type, self.route, reason)
    }

    fn exact<const N: usize>(&self) -> Result<[&'a str; N]> {
        <[&'a str; N]>::try_from(self.parts.as_slice()).map_err(|_| {
            self.error(format!(
                "expected {N} fields, found {}",
                self.parts.len()
            ))
        })
    }

    fn id(&self, token: &str, what: &str) -> Result<String> {
        if token.is_empty() {
            return Err(self.error(format!("empty {what}")));
        }
        Ok(token.to_string())
    }

    fn singleton(&self, what: &str) -> Result<String> {
        let [token] = self.exact::<1>()?;
        self.id(token, what)
    }

    fn number(&self, token: &str, what: &str) -> Result<u32> {
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(self.error(format!("{what} {token:?} is not a number")));
        }
        token
            .parse()
            .map_err(|_| self.error(format!("{what} {token:?} is out of range")))
    }

    fn window(&self, start: &str, end: &str) -> Result<DateWindow> {
        let bound = |token: &str| {
            parse_bound(token).ok_or_else(|| self.error(format!("invalid date {token:?}")))
        };
        Ok(DateWindow::from_bounds(bound(start)?, bound(end)?))
    }
}
