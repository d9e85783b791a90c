//! Error types for content identifiers and feed subscriptions.

use crate::types::{ContentDigest, ContentType};
use thiserror::Error;

/// Main error type for identifier decoding and feed lifecycle operations.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed {content_type} route {route:?}: {reason}")]
    MalformedRoute {
        content_type: ContentType,
        route: String,
        reason: String,
    },

    #[error("Unknown content type: {0}")]
    UnknownContentType(String),

    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Transport refused feed {id}: {reason}")]
    FeedOpenFailed { id: ContentDigest, reason: String },

    #[error("Subscription {id} belongs to a stale session")]
    StaleSession { id: ContentDigest },

    #[error("Pageable family mismatch: expected {expected}, got {got}")]
    AssociationMismatch {
        expected: ContentDigest,
        got: ContentDigest,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl FeedError {
    pub(crate) fn malformed(
        content_type: ContentType,
        route: &str,
        reason: impl Into<String>,
    ) -> Self {
        FeedError::MalformedRoute {
            content_type,
            route: route.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            FeedError::Deserialization(e.to_string())
        } else {
            FeedError::Serialization(e.to_string())
        }
    }
}

impl From<rmp_serde::encode::Error> for FeedError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        FeedError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for FeedError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        FeedError::Deserialization(e.to_string())
    }
}

impl From<hex::FromHexError> for FeedError {
    fn from(e: hex::FromHexError) -> Self {
        FeedError::Deserialization(e.to_string())
    }
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;
