//! Shared subscription objects and their end-of-life signal.

use crate::error::{FeedError, Result};
use crate::routes::ContentIdentifier;
use crate::types::{ContentDigest, SessionToken};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Receives the teardown signal of a [`Subscription`].
///
/// Called exactly once, from the drop of the last owner. Implementations
/// must not block and must tolerate a transport that is already closed.
pub trait UnsubscriptionController: Send + Sync {
    fn unsubscribe(&self, subscription: &Subscription);
}

/// Someone is listening to a [`ContentIdentifier`].
///
/// Shared by every consumer of the same id through `Arc`. The controller is
/// held weakly, so outstanding subscriptions never keep it alive.
pub struct Subscription {
    identifier: ContentIdentifier,
    generation: u64,
    session_token: RwLock<SessionToken>,
    links: Mutex<FamilyLinks>,
    controller: Weak<dyn UnsubscriptionController>,
}

/// Position of a subscription in its paging family.
#[derive(Default)]
struct FamilyLinks {
    /// Generation of the subscription holding this one, if any.
    owner: Option<u64>,
    associated: Vec<Arc<Subscription>>,
}

impl Subscription {
    pub fn new(
        identifier: ContentIdentifier,
        session_token: SessionToken,
        controller: Weak<dyn UnsubscriptionController>,
    ) -> Self {
        Self {
            identifier,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            session_token: RwLock::new(session_token),
            links: Mutex::new(FamilyLinks::default()),
            controller,
        }
    }

    pub fn id(&self) -> ContentDigest {
        self.identifier.id()
    }

    pub fn pageable_id(&self) -> ContentDigest {
        self.identifier.pageable_id()
    }

    pub fn identifier(&self) -> &ContentIdentifier {
        &self.identifier
    }

    /// Unique per instance; two subscriptions for the same id never share one.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn session_token(&self) -> SessionToken {
        self.session_token.read().clone()
    }

    pub fn is_stale(&self, live: &SessionToken) -> bool {
        *self.session_token.read() != *live
    }

    pub(crate) fn set_session_token(&self, token: SessionToken) {
        *self.session_token.write() = token;
    }

    /// Link a sibling page so it lives as long as this subscription.
    ///
    /// Fails without touching either side when the pageable families differ,
    /// when `other` is this subscription, when this subscription is itself
    /// held by an owner, or when `other` already has an owner or owns pages
    /// of its own (families are one level deep). Associating a page that is
    /// already linked here is a no-op.
    pub fn associate(&self, other: Arc<Subscription>) -> Result<()> {
        if self.pageable_id() != other.pageable_id() {
            return Err(FeedError::AssociationMismatch {
                expected: self.pageable_id(),
                got: other.pageable_id(),
            });
        }
        if self.id() == other.id() {
            return Err(FeedError::InvalidOperation(format!(
                "subscription {} cannot be associated with itself",
                self.id()
            )));
        }

        let (mut mine, mut theirs) = self.lock_pair(&other);
        if theirs.owner == Some(self.generation) {
            return Ok(());
        }
        if mine.owner.is_some() {
            return Err(FeedError::InvalidOperation(format!(
                "subscription {} is already associated to an owner",
                self.id()
            )));
        }
        if theirs.owner.is_some() || !theirs.associated.is_empty() {
            return Err(FeedError::InvalidOperation(format!(
                "subscription {} already belongs to a family",
                other.id()
            )));
        }

        theirs.owner = Some(self.generation);
        drop(theirs);
        mine.associated.push(other);
        Ok(())
    }

    /// Unlink one sibling, returning it. The sibling is released if this was
    /// its last owner.
    pub fn dissociate(&self, id: &ContentDigest) -> Option<Arc<Subscription>> {
        let removed = {
            let mut links = self.links.lock();
            let index = links.associated.iter().position(|s| s.id() == *id)?;
            links.associated.remove(index)
        };
        removed.clear_owner(self.generation);
        Some(removed)
    }

    pub fn associated_subscriptions(&self) -> Vec<Arc<Subscription>> {
        self.links.lock().associated.clone()
    }

    pub fn associated_count(&self) -> usize {
        self.links.lock().associated.len()
    }

    /// Whether another subscription holds this one in its family.
    pub fn has_owner(&self) -> bool {
        self.links.lock().owner.is_some()
    }

    /// Lock both families in generation order.
    fn lock_pair<'a, 'b>(
        &'a self,
        other: &'b Subscription,
    ) -> (MutexGuard<'a, FamilyLinks>, MutexGuard<'b, FamilyLinks>) {
        if self.generation < other.generation {
            let mine = self.links.lock();
            (mine, other.links.lock())
        } else {
            let theirs = other.links.lock();
            (self.links.lock(), theirs)
        }
    }

    fn clear_owner(&self, owner: u64) {
        let mut links = self.links.lock();
        if links.owner == Some(owner) {
            links.owner = None;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(controller) = self.controller.upgrade() {
            controller.unsubscribe(self);
        }
        for page in std::mem::take(&mut self.links.get_mut().associated) {
            page.clear_owner(self.generation);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("identifier", &self.identifier)
            .field("generation", &self.generation)
            .field("session_token", &*self.session_token.read())
            .field("associated", &self.associated_count())
            .finish()
    }
}
