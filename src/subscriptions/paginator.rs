//! Paged families: page 0 owns the family, later pages hang off it.

use super::registry::FeedRegistry;
use super::subscription::Subscription;
use super::types::FeedHandle;
use crate::error::{FeedError, Result};
use crate::routes::{ContentIdentifier, ContentRoute};
use std::sync::Arc;
use tracing::debug;

/// Drives "load next page" for one pageable route.
///
/// Dropping the paginator releases the whole family.
pub struct Paginator {
    registry: FeedRegistry,
    root: FeedHandle,
    root_route: ContentRoute,
    pages: Vec<(u32, FeedHandle)>,
    current_page: u32,
    has_next_page: bool,
}

impl Paginator {
    /// Subscribe to the first page of `route`.
    pub fn open(registry: FeedRegistry, route: ContentRoute) -> Result<Self> {
        let current_page = route.page_index().ok_or_else(|| {
            FeedError::InvalidOperation(format!(
                "{} routes are not paged",
                route.content_type()
            ))
        })?;
        let root = registry.subscribe(ContentIdentifier::new(route.clone()))?;

        Ok(Self {
            registry,
            root,
            root_route: route,
            pages: Vec::new(),
            current_page,
            has_next_page: false,
        })
    }

    pub fn root(&self) -> &FeedHandle {
        &self.root
    }

    pub fn pages(&self) -> impl Iterator<Item = (u32, &FeedHandle)> {
        self.pages.iter().map(|(index, handle)| (*index, handle))
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn has_next_page(&self) -> bool {
        self.has_next_page
    }

    /// Record how many items the last page delivered.
    ///
    /// A full page means another one may exist. Routes without a page size
    /// never have a next page.
    pub fn record_page_len(&mut self, len: usize) {
        self.has_next_page = self
            .root_route
            .event_count()
            .is_some_and(|size| len >= size as usize);
    }

    /// Subscribe the next page and associate it to page 0.
    ///
    /// Returns `None` when the last recorded page was not full.
    pub fn next_page(&mut self) -> Result<Option<&FeedHandle>> {
        if !self.has_next_page {
            return Ok(None);
        }
        let root = self.root_subscription()?;
        self.registry.ensure_current(&root)?;

        let next_index = self.current_page.checked_add(1).ok_or_else(|| {
            FeedError::InvalidOperation(format!("page {} is the last page", self.current_page))
        })?;
        let route = self.root_route.with_page_index(next_index).ok_or_else(|| {
            FeedError::InvalidOperation("route lost its page index".to_string())
        })?;

        let page = self.registry.subscribe(ContentIdentifier::new(route))?;
        if let Some(subscription) = page.subscription() {
            root.associate(Arc::clone(subscription))?;
        }

        debug!(family = %root.pageable_id(), page = next_index, "next page subscribed");
        self.current_page = next_index;
        self.has_next_page = false;
        self.pages.push((next_index, page));
        Ok(self.pages.last().map(|(_, handle)| handle))
    }

    /// Release one page without touching its siblings.
    pub fn release_page(&mut self, page_index: u32) -> bool {
        let Some(position) = self.pages.iter().position(|(index, _)| *index == page_index) else {
            return false;
        };
        let (_, mut page) = self.pages.remove(position);
        if let (Some(root), Some(id)) = (self.root.subscription(), page.id()) {
            drop(root.dissociate(&id));
        }
        page.release();
        true
    }

    fn root_subscription(&self) -> Result<Arc<Subscription>> {
        self.root
            .subscription()
            .cloned()
            .ok_or_else(|| FeedError::InvalidOperation("paginator root released".to_string()))
    }
}
