//! Content identifiers: hashed keys for one resource fetched one way.

use super::route::ContentRoute;
use crate::error::{FeedError, Result};
use crate::types::{ContentDigest, ContentType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A content type plus the route that reproduces the request, keyed by two
/// digests computed at construction.
///
/// Equality and hashing only look at `(id, pageable_id)`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "WireContentIdentifier", into = "WireContentIdentifier")]
pub struct ContentIdentifier {
    content_type: ContentType,
    route: ContentRoute,
    id: ContentDigest,
    pageable_id: ContentDigest,
}

impl ContentIdentifier {
    /// Build an identifier. The content type is the route's own type.
    pub fn new(route: ContentRoute) -> Self {
        let content_type = route.content_type();
        let tag = content_type.tag();
        let id = ContentDigest::namespaced(tag, &route.full_route());
        let pageable_id = ContentDigest::namespaced(tag, &route.pageable_route());
        Self {
            content_type,
            route,
            id,
            pageable_id,
        }
    }

    /// Strict decode from a `(type, route)` pair.
    pub fn decode(content_type: &str, route: &str) -> Result<Self> {
        let content_type = ContentType::from_tag(content_type)
            .ok_or_else(|| FeedError::UnknownContentType(content_type.to_string()))?;
        Ok(Self::new(ContentRoute::parse(content_type, route)?))
    }

    pub fn id(&self) -> ContentDigest {
        self.id
    }

    pub fn pageable_id(&self) -> ContentDigest {
        self.pageable_id
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn route(&self) -> &ContentRoute {
        &self.route
    }

    pub fn to_wire(&self) -> WireContentIdentifier {
        WireContentIdentifier {
            content_type: self.content_type.tag().to_string(),
            route: self.route.full_route(),
        }
    }

    /// Opaque hex token (MessagePack of the wire form).
    pub fn to_token(&self) -> Result<String> {
        let bytes = rmp_serde::to_vec(&self.to_wire())?;
        Ok(hex::encode(bytes))
    }

    pub fn from_token(token: &str) -> Result<Self> {
        let bytes = hex::decode(token)?;
        let wire: WireContentIdentifier = rmp_serde::from_slice(&bytes)?;
        Self::try_from(wire)
    }
}

impl PartialEq for ContentIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.pageable_id == other.pageable_id
    }
}

impl Eq for ContentIdentifier {}

impl Hash for ContentIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.pageable_id.hash(state);
    }
}

impl fmt::Debug for ContentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ContentIdentifier({}:{} {:?})",
            self.content_type,
            self.route.full_route(),
            self.id
        )
    }
}

impl fmt::Display for ContentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.content_type, self.route.full_route())
    }
}

impl From<ContentRoute> for ContentIdentifier {
    fn from(route: ContentRoute) -> Self {
        ContentIdentifier::new(route)
    }
}

/// Wire form of an identifier: `{"type": "...", "route": "..."}`.
///
/// The backend's `contentId` object names the route `id`; both keys decode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireContentIdentifier {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(alias = "id")]
    pub route: String,
}

impl TryFrom<WireContentIdentifier> for ContentIdentifier {
    type Error = FeedError;

    fn try_from(wire: WireContentIdentifier) -> Result<Self> {
        ContentIdentifier::decode(&wire.content_type, &wire.route)
    }
}

impl From<ContentIdentifier> for WireContentIdentifier {
    fn from(identifier: ContentIdentifier) -> Self {
        identifier.to_wire()
    }
}
