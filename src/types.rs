//! Core types shared by routes, identifiers and subscriptions.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Kind of server-side resource a feed delivers.
///
/// The tag of each variant is the namespace prefix hashed into every
/// [`ContentDigest`]. Renaming a tag changes every derived identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentType {
    LiveEvents,
    PreLiveEvents,
    LiveSports,
    PreLiveSports,
    EventDetails,
    EventDetailsLiveData,
    EventMainMarket,
    EventSecundaryMarkets,
    EventGroup,
    EventSummary,
    Market,
    Outcome,
}

impl ContentType {
    pub const ALL: [ContentType; 12] = [
        ContentType::LiveEvents,
        ContentType::PreLiveEvents,
        ContentType::LiveSports,
        ContentType::PreLiveSports,
        ContentType::EventDetails,
        ContentType::EventDetailsLiveData,
        ContentType::EventMainMarket,
        ContentType::EventSecundaryMarkets,
        ContentType::EventGroup,
        ContentType::EventSummary,
        ContentType::Market,
        ContentType::Outcome,
    ];

    /// Stable wire tag.
    pub fn tag(self) -> &'static str {
        match self {
            ContentType::LiveEvents => "liveEvents",
            ContentType::PreLiveEvents => "preLiveEvents",
            ContentType::LiveSports => "liveSports",
            ContentType::PreLiveSports => "preLiveSports",
            ContentType::EventDetails => "eventDetails",
            ContentType::EventDetailsLiveData => "eventDetailsLiveData",
            ContentType::EventMainMarket => "eventMainMarket",
            ContentType::EventSecundaryMarkets => "eventSecundaryMarkets",
            ContentType::EventGroup => "eventGroup",
            ContentType::EventSummary => "eventSummary",
            ContentType::Market => "market",
            ContentType::Outcome => "outcome",
        }
    }

    /// Parse a wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Whether routes of this type are split into pages.
    pub fn is_paged(self) -> bool {
        matches!(self, ContentType::LiveEvents | ContentType::PreLiveEvents)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Sort order requested for an event list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventListSort {
    ByStartDate,
    ByPopularity,
}

impl EventListSort {
    pub fn token(self) -> &'static str {
        match self {
            EventListSort::ByStartDate => "byStartDate",
            EventListSort::ByPopularity => "byPopularity",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "byStartDate" => Some(EventListSort::ByStartDate),
            "byPopularity" => Some(EventListSort::ByPopularity),
            _ => None,
        }
    }
}

impl Default for EventListSort {
    fn default() -> Self {
        EventListSort::ByStartDate
    }
}

impl fmt::Display for EventListSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// SHA-256 digest keying one content feed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentDigest(pub [u8; 32]);

impl ContentDigest {
    /// Compute digest from bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hasher.finalize().into())
    }

    /// Digest of `namespace + "-" + route`.
    pub fn namespaced(namespace: &str, route: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        hasher.update(b"-");
        hasher.update(route.as_bytes());
        ContentDigest(hasher.finalize().into())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(ContentDigest(arr))
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Opaque token of the transport session a feed was opened under.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        SessionToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionToken {
    fn from(token: &str) -> Self {
        SessionToken::new(token)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({})", self.0)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
