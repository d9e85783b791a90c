//! Registry deduplicating feeds by content id and fanning updates out.

use crate::error::{FeedError, Result};
use crate::routes::ContentIdentifier;
use crate::transport::Transport;
use crate::types::{ContentDigest, SessionToken};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use super::subscription::{Subscription, UnsubscriptionController};
use super::types::{
    ConsumerId, DropReason, FeedConfig, FeedEvent, FeedHandle, FeedPhase, ReconnectSummary,
};

/// One attached consumer's sending side.
///
/// The channel holds `capacity + 1` events. The spare slot is reserved for
/// the `Dropped` notice sent when the consumer falls behind.
struct Consumer {
    id: ConsumerId,
    sender: Sender<FeedEvent>,
    capacity: usize,
}

enum Delivery {
    Sent,
    Overflowed,
    Gone,
}

impl Consumer {
    fn deliver(&self, event: FeedEvent) -> Delivery {
        if self.sender.len() >= self.capacity {
            let _ = self.sender.try_send(FeedEvent::Dropped {
                reason: DropReason::BufferOverflow,
            });
            return Delivery::Overflowed;
        }
        match self.sender.try_send(event) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => Delivery::Overflowed,
            Err(TrySendError::Disconnected(_)) => Delivery::Gone,
        }
    }
}

/// Registry state for one content id.
struct FeedEntry {
    identifier: ContentIdentifier,
    phase: FeedPhase,
    /// Generation of the live subscription; 0 while opening.
    generation: u64,
    subscription: Weak<Subscription>,
    consumers: Vec<Consumer>,
    /// Most recent content, replayed to late joiners.
    latest: Option<serde_json::Value>,
    /// Content that arrived before the open was confirmed locally.
    early: Vec<serde_json::Value>,
}

impl FeedEntry {
    fn opening(identifier: ContentIdentifier) -> Self {
        Self {
            identifier,
            phase: FeedPhase::Opening,
            generation: 0,
            subscription: Weak::new(),
            consumers: Vec::new(),
            latest: None,
            early: Vec::new(),
        }
    }

    fn is_live(&self) -> bool {
        matches!(self.phase, FeedPhase::Active | FeedPhase::Reconnecting)
    }

    /// Attach a consumer. `Connected` is always its first event.
    fn attach(
        &mut self,
        id: ConsumerId,
        config: &FeedConfig,
        subscription_id: ContentDigest,
    ) -> Receiver<FeedEvent> {
        let capacity = config.buffer_size.max(1);
        let (sender, receiver) = bounded(capacity + 1);
        let consumer = Consumer {
            id,
            sender,
            capacity,
        };

        let mut attached = matches!(
            consumer.deliver(FeedEvent::Connected { subscription_id }),
            Delivery::Sent
        );
        if attached && config.replay_latest {
            if let Some(content) = &self.latest {
                attached = matches!(
                    consumer.deliver(FeedEvent::ContentUpdate {
                        content: content.clone(),
                    }),
                    Delivery::Sent
                );
            }
        }

        if attached {
            self.consumers.push(consumer);
        }
        receiver
    }

    /// Send to every consumer in order, dropping the ones that cannot keep up.
    fn broadcast(&mut self, event: &FeedEvent) {
        let id = self.identifier.id();
        self.consumers
            .retain(|consumer| match consumer.deliver(event.clone()) {
                Delivery::Sent => true,
                Delivery::Overflowed => {
                    warn!(id = %id, consumer = consumer.id.0, "dropping slow feed consumer");
                    false
                }
                Delivery::Gone => false,
            });
    }

    fn push_content(&mut self, content: serde_json::Value, replay_latest: bool) {
        if replay_latest {
            self.latest = Some(content.clone());
        }
        self.broadcast(&FeedEvent::ContentUpdate { content });
    }
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<ContentDigest, FeedEntry>,
}

/// Teardown request queued by the last owner of a subscription.
struct Teardown {
    identifier: ContentIdentifier,
    generation: u64,
    session: SessionToken,
}

struct Shared {
    config: FeedConfig,
    transport: Arc<dyn Transport>,
    state: Mutex<RegistryState>,
    /// Signalled whenever an entry leaves `Opening` or is purged.
    changed: Condvar,
    next_consumer: AtomicU64,
    teardown: Sender<Teardown>,
}

impl Shared {
    fn next_consumer(&self) -> ConsumerId {
        ConsumerId(self.next_consumer.fetch_add(1, Ordering::Relaxed))
    }

    /// Mark the entry closing if the job still matches it.
    fn begin_close(&self, job: &Teardown) -> bool {
        let mut state = self.state.lock();
        match state.entries.get_mut(&job.identifier.id()) {
            Some(entry)
                if entry.generation == job.generation
                    && entry.subscription.strong_count() == 0 =>
            {
                entry.phase = FeedPhase::Closing;
                true
            }
            _ => false,
        }
    }

    fn finish_close(&self, job: &Teardown) {
        let id = job.identifier.id();
        let mut state = self.state.lock();
        if state
            .entries
            .get(&id)
            .is_some_and(|entry| entry.generation == job.generation)
        {
            state.entries.remove(&id);
            debug!(id = %id, identifier = %job.identifier, "feed purged");
        }
        self.changed.notify_all();
    }
}

impl UnsubscriptionController for Shared {
    fn unsubscribe(&self, subscription: &Subscription) {
        let job = Teardown {
            identifier: subscription.identifier().clone(),
            generation: subscription.generation(),
            session: subscription.session_token(),
        };
        if self.teardown.send(job).is_err() {
            warn!(id = %subscription.id(), "teardown worker gone; feed left open");
        }
    }
}

fn run_teardown(shared: Weak<Shared>, transport: Arc<dyn Transport>, jobs: Receiver<Teardown>) {
    for job in jobs.iter() {
        let Some(shared) = shared.upgrade() else {
            break;
        };

        if shared.begin_close(&job) {
            match transport.close_feed(&job.identifier, &job.session) {
                Ok(()) => debug!(id = %job.identifier.id(), "feed closed"),
                Err(e) => warn!(
                    id = %job.identifier.id(),
                    error = %e,
                    "feed close failed; purging locally"
                ),
            }
        } else {
            trace!(id = %job.identifier.id(), "stale teardown job skipped");
        }

        shared.finish_close(&job);
    }
}

/// Deduplicating registry of live feeds.
///
/// Every content id has at most one transport feed. The first subscriber
/// opens it; later subscribers attach locally. The feed is closed by a
/// background worker once the last owner of its [`Subscription`] is gone.
#[derive(Clone)]
pub struct FeedRegistry {
    shared: Arc<Shared>,
}

impl FeedRegistry {
    /// Create a registry and start its teardown worker.
    pub fn new(transport: Arc<dyn Transport>, config: FeedConfig) -> Result<Self> {
        let (sender, receiver) = unbounded();
        let shared = Arc::new(Shared {
            config,
            transport: Arc::clone(&transport),
            state: Mutex::new(RegistryState::default()),
            changed: Condvar::new(),
            next_consumer: AtomicU64::new(1),
            teardown: sender,
        });

        let worker = Arc::downgrade(&shared);
        thread::Builder::new()
            .name("feed-teardown".to_string())
            .spawn(move || run_teardown(worker, transport, receiver))?;

        Ok(Self { shared })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.shared.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.shared.transport
    }

    fn controller(&self) -> Weak<dyn UnsubscriptionController> {
        let controller: Arc<dyn UnsubscriptionController> = self.shared.clone();
        Arc::downgrade(&controller)
    }

    /// Subscribe to a content id.
    ///
    /// Attaching to a live feed returns at once. Otherwise the caller blocks
    /// until the transport confirms or refuses the new feed; concurrent
    /// callers for the same id wait for that outcome instead of opening a
    /// second feed. A feed being torn down is waited out and then reopened.
    pub fn subscribe(&self, identifier: ContentIdentifier) -> Result<FeedHandle> {
        identifier.route().validate()?;
        let id = identifier.id();
        let mut state = self.shared.state.lock();

        loop {
            let attached = match state.entries.get_mut(&id) {
                None => break,
                Some(entry) if entry.is_live() => {
                    entry.subscription.upgrade().map(|subscription| {
                        let consumer = self.shared.next_consumer();
                        let receiver = entry.attach(consumer, &self.shared.config, id);
                        (consumer, subscription, receiver)
                    })
                }
                Some(_) => None,
            };

            match attached {
                Some((consumer, subscription, receiver)) => {
                    drop(state);
                    debug!(id = %id, consumer = consumer.0, "attached to live feed");
                    return Ok(FeedHandle::new(consumer, subscription, receiver));
                }
                None => self.shared.changed.wait(&mut state),
            }
        }

        state
            .entries
            .insert(id, FeedEntry::opening(identifier.clone()));
        drop(state);

        self.open(identifier)
    }

    fn open(&self, identifier: ContentIdentifier) -> Result<FeedHandle> {
        let id = identifier.id();
        let transport = &self.shared.transport;

        let opened = match transport.session_token() {
            Some(session) => transport.open_feed(&identifier, &session).map(|()| session),
            None => Err(FeedError::TransportUnavailable(
                "no active session".to_string(),
            )),
        };

        let mut state = self.shared.state.lock();
        let session = match opened {
            Ok(session) => session,
            Err(e) => {
                state.entries.remove(&id);
                drop(state);
                self.shared.changed.notify_all();
                debug!(id = %id, error = %e, "feed open failed");
                return Err(e);
            }
        };

        let subscription = Arc::new(Subscription::new(
            identifier.clone(),
            session.clone(),
            self.controller(),
        ));
        let consumer = self.shared.next_consumer();
        let replay_latest = self.shared.config.replay_latest;

        let entry = state
            .entries
            .entry(id)
            .or_insert_with(|| FeedEntry::opening(identifier.clone()));
        entry.phase = FeedPhase::Active;
        entry.generation = subscription.generation();
        entry.subscription = Arc::downgrade(&subscription);
        let receiver = entry.attach(consumer, &self.shared.config, id);
        for content in std::mem::take(&mut entry.early) {
            entry.push_content(content, replay_latest);
        }
        drop(state);

        self.shared.changed.notify_all();
        debug!(id = %id, identifier = %identifier, session = %session, "feed opened");
        Ok(FeedHandle::new(consumer, subscription, receiver))
    }

    /// Deliver content to every consumer of the identifier, in call order.
    ///
    /// Returns false when no live feed exists for the id.
    pub fn dispatch(&self, identifier: &ContentIdentifier, content: serde_json::Value) -> bool {
        let id = identifier.id();
        let replay_latest = self.shared.config.replay_latest;
        let mut state = self.shared.state.lock();

        match state.entries.get_mut(&id) {
            Some(entry) if entry.is_live() => {
                entry.push_content(content, replay_latest);
                true
            }
            Some(entry) if entry.phase == FeedPhase::Opening => {
                entry.early.push(content);
                true
            }
            _ => {
                trace!(id = %id, identifier = %identifier, "content for unknown feed ignored");
                false
            }
        }
    }

    /// Tell every consumer the transport went away.
    pub fn disconnect_all(&self) {
        let mut state = self.shared.state.lock();
        for entry in state.entries.values_mut().filter(|e| e.is_live()) {
            entry.broadcast(&FeedEvent::Disconnected);
        }
        info!(feeds = state.entries.len(), "transport disconnected");
    }

    /// Re-open every feed whose session is no longer the live one.
    ///
    /// Refcounts and associations are untouched. Consumers see `Connected`
    /// again on success and `ReconnectFailed` otherwise.
    pub fn reconnect_if_needed(&self) -> Result<ReconnectSummary> {
        let transport = &self.shared.transport;
        let session = transport.session_token().ok_or_else(|| {
            FeedError::TransportUnavailable("no active session to reconnect".to_string())
        })?;

        let mut stale: Vec<Arc<Subscription>> = {
            let mut state = self.shared.state.lock();
            state
                .entries
                .values_mut()
                .filter(|entry| entry.phase == FeedPhase::Active)
                .filter_map(|entry| {
                    let subscription = entry.subscription.upgrade()?;
                    if subscription.is_stale(&session) {
                        entry.phase = FeedPhase::Reconnecting;
                        Some(subscription)
                    } else {
                        None
                    }
                })
                .collect()
        };
        // Family owners before their pages.
        stale.sort_by_key(|s| std::cmp::Reverse(s.associated_count()));

        let mut summary = ReconnectSummary {
            session: session.clone(),
            reopened: Vec::new(),
            failed: Vec::new(),
        };

        for subscription in &stale {
            let id = subscription.id();
            let outcome = transport.open_feed(subscription.identifier(), &session);
            if outcome.is_ok() {
                subscription.set_session_token(session.clone());
            }

            let mut state = self.shared.state.lock();
            let entry = state
                .entries
                .get_mut(&id)
                .filter(|entry| entry.generation == subscription.generation());
            match (outcome, entry) {
                (Ok(()), Some(entry)) => {
                    entry.phase = FeedPhase::Active;
                    entry.broadcast(&FeedEvent::Connected { subscription_id: id });
                    summary.reopened.push(id);
                }
                (Err(e), Some(entry)) => {
                    entry.phase = FeedPhase::Active;
                    entry.broadcast(&FeedEvent::ReconnectFailed {
                        reason: e.to_string(),
                    });
                    warn!(id = %id, error = %e, "feed reconnect failed");
                    summary.failed.push((id, e.to_string()));
                }
                (_, None) => {}
            }
        }
        drop(stale);

        info!(
            session = %session,
            reopened = summary.reopened.len(),
            failed = summary.failed.len(),
            "reconnect pass finished"
        );
        Ok(summary)
    }

    /// Fail with `StaleSession` unless the identifier's feed runs under the
    /// live session.
    pub fn ensure_current(&self, subscription: &Subscription) -> Result<()> {
        match self.shared.transport.session_token() {
            Some(live) if !subscription.is_stale(&live) => Ok(()),
            Some(_) => Err(FeedError::StaleSession {
                id: subscription.id(),
            }),
            None => Err(FeedError::TransportUnavailable(
                "no active session".to_string(),
            )),
        }
    }

    /// Owners of the identifier's subscription (consumer handles plus the
    /// family owner holding it, if any). 0 when not registered.
    pub fn refcount(&self, identifier: &ContentIdentifier) -> usize {
        self.shared
            .state
            .lock()
            .entries
            .get(&identifier.id())
            .map_or(0, |entry| entry.subscription.strong_count())
    }

    pub fn phase(&self, identifier: &ContentIdentifier) -> Option<FeedPhase> {
        self.shared
            .state
            .lock()
            .entries
            .get(&identifier.id())
            .map(|entry| entry.phase)
    }

    pub fn consumer_count(&self, identifier: &ContentIdentifier) -> usize {
        self.shared
            .state
            .lock()
            .entries
            .get(&identifier.id())
            .map_or(0, |entry| entry.consumers.len())
    }

    /// Number of registered feeds, including ones opening or closing.
    pub fn feed_count(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    /// Block until the identifier has no registry entry or the timeout
    /// passes. Returns whether the entry is gone.
    pub fn wait_for_teardown(&self, identifier: &ContentIdentifier, timeout: Duration) -> bool {
        let id = identifier.id();
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.entries.contains_key(&id) {
            if self
                .shared
                .changed
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return !state.entries.contains_key(&id);
            }
        }
        true
    }
}
