//! Recording transport shared by the integration tests.

#![allow(dead_code)]

use content_feeds::{ContentDigest, ContentIdentifier, FeedError, Result, SessionToken, Transport};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Open(ContentDigest, SessionToken),
    Close(ContentDigest),
}

pub struct MockTransport {
    session: Mutex<Option<SessionToken>>,
    calls: Mutex<Vec<Call>>,
    failing_opens: Mutex<HashSet<ContentDigest>>,
    fail_closes: AtomicBool,
    open_delay: Mutex<Duration>,
}

impl MockTransport {
    pub fn new(session: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            session: Mutex::new(session.map(SessionToken::from)),
            calls: Mutex::new(Vec::new()),
            failing_opens: Mutex::new(HashSet::new()),
            fail_closes: AtomicBool::new(false),
            open_delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn set_session(&self, session: Option<&str>) {
        *self.session.lock() = session.map(SessionToken::from);
    }

    pub fn fail_open(&self, identifier: &ContentIdentifier) {
        self.failing_opens.lock().insert(identifier.id());
    }

    pub fn allow_open(&self, identifier: &ContentIdentifier) {
        self.failing_opens.lock().remove(&identifier.id());
    }

    pub fn fail_closes(&self, fail: bool) {
        self.fail_closes.store(fail, Ordering::SeqCst);
    }

    pub fn set_open_delay(&self, delay: Duration) {
        *self.open_delay.lock() = delay;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, identifier: &ContentIdentifier) -> Vec<Call> {
        let id = identifier.id();
        self.calls()
            .into_iter()
            .filter(|call| match call {
                Call::Open(open_id, _) => *open_id == id,
                Call::Close(close_id) => *close_id == id,
            })
            .collect()
    }

    pub fn opens(&self, identifier: &ContentIdentifier) -> usize {
        self.calls_for(identifier)
            .iter()
            .filter(|call| matches!(call, Call::Open(..)))
            .count()
    }

    pub fn closes(&self, identifier: &ContentIdentifier) -> usize {
        self.calls_for(identifier)
            .iter()
            .filter(|call| matches!(call, Call::Close(_)))
            .count()
    }

    pub fn total_opens(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Open(..)))
            .count()
    }
}

impl Transport for MockTransport {
    fn session_token(&self) -> Option<SessionToken> {
        self.session.lock().clone()
    }

    fn open_feed(&self, identifier: &ContentIdentifier, session: &SessionToken) -> Result<()> {
        let delay = *self.open_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if self.failing_opens.lock().contains(&identifier.id()) {
            return Err(FeedError::FeedOpenFailed {
                id: identifier.id(),
                reason: "HTTP 503".to_string(),
            });
        }
        self.calls
            .lock()
            .push(Call::Open(identifier.id(), session.clone()));
        Ok(())
    }

    fn close_feed(&self, identifier: &ContentIdentifier, _session: &SessionToken) -> Result<()> {
        self.calls.lock().push(Call::Close(identifier.id()));
        if self.fail_closes.load(Ordering::SeqCst) {
            return Err(FeedError::TransportUnavailable(
                "socket already closed".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);
