//! Error handling and edge case tests.

mod support;

use content_feeds::{
    ContentIdentifier, ContentRoute, DateWindow, DropReason, EventListSort, FeedClient,
    FeedConfig, FeedError, FeedEvent, FeedPhase, WireContentIdentifier,
};
use crossbeam_channel::TryRecvError;
use std::sync::Arc;
use support::{init_tracing, Call, MockTransport, TEARDOWN_TIMEOUT};

fn client(transport: &Arc<MockTransport>) -> FeedClient {
    init_tracing();
    FeedClient::new(transport.clone(), FeedConfig::default()).unwrap()
}

fn market(id: &str) -> ContentIdentifier {
    ContentIdentifier::new(ContentRoute::market(id))
}

// --- Route Errors ---

#[test]
fn test_decode_pre_live_events_missing_fields() {
    let wire: WireContentIdentifier =
        serde_json::from_str(r#"{"type":"preLiveEvents","route":"soccer/202401010000"}"#)
            .unwrap();
    let result = ContentIdentifier::try_from(wire);

    match result {
        Err(FeedError::MalformedRoute { route, .. }) => {
            assert_eq!(route, "soccer/202401010000");
        }
        other => panic!("Expected MalformedRoute, got {:?}", other),
    }
}

#[test]
fn test_decode_bad_sort_token() {
    let result = ContentIdentifier::decode(
        "preLiveEvents",
        "soccer/202401010000/202502010000/0/10/byOdds",
    );
    assert!(matches!(result, Err(FeedError::MalformedRoute { .. })));
}

#[test]
fn test_decode_unknown_type() {
    let result = ContentIdentifier::decode("horoscope", "aries");
    assert!(matches!(result, Err(FeedError::UnknownContentType(t)) if t == "horoscope"));
}

#[test]
fn test_serde_rejects_malformed_identifier() {
    let result: Result<ContentIdentifier, _> =
        serde_json::from_str(r#"{"type":"liveEvents","route":"FBL/zero"}"#);
    assert!(result.is_err());
}

#[test]
fn test_bad_token() {
    assert!(matches!(
        ContentIdentifier::from_token("not-hex"),
        Err(FeedError::Deserialization(_))
    ));
    assert!(matches!(
        ContentIdentifier::from_token("c0ffee"),
        Err(FeedError::Deserialization(_))
    ));
}

#[test]
fn test_subscribe_refuses_unroutable_ids() {
    let transport = MockTransport::new(Some("s1"));
    let client = client(&transport);

    for route in [
        ContentRoute::market("a/b"),
        ContentRoute::outcome(""),
        ContentRoute::live_events("", 0),
    ] {
        let result = client.subscribe_route(route);
        assert!(matches!(result, Err(FeedError::MalformedRoute { .. })));
    }
    assert!(client.live_events("FBL/1").is_err());
    assert_eq!(transport.total_opens(), 0);
    assert_eq!(client.registry().feed_count(), 0);
}

// --- Transport Errors ---

#[test]
fn test_subscribe_without_session() {
    let transport = MockTransport::new(Some("s1"));
    let client = client(&transport);
    let existing = client.subscribe_market("M1").unwrap();

    transport.set_session(None);
    let result = client.subscribe_market("M2");
    assert!(matches!(result, Err(FeedError::TransportUnavailable(_))));
    assert_eq!(client.registry().phase(&market("M2")), None);

    // Attaching to a live feed needs no session.
    let attached = client.subscribe_market("M1").unwrap();
    assert_eq!(attached.id(), existing.id());
    assert_eq!(client.registry().refcount(&market("M1")), 2);
}

#[test]
fn test_failed_open_leaves_no_entry() {
    let transport = MockTransport::new(Some("s1"));
    let client = client(&transport);
    let m1 = market("M1");
    let other = client.subscribe_market("M2").unwrap();

    transport.fail_open(&m1);
    let result = client.subscribe_market("M1");
    assert!(matches!(result, Err(FeedError::FeedOpenFailed { id, .. }) if id == m1.id()));
    assert_eq!(client.registry().phase(&m1), None);
    assert_eq!(client.registry().refcount(&m1), 0);
    assert_eq!(client.registry().feed_count(), 1);
    assert!(other.try_recv().is_ok());

    transport.allow_open(&m1);
    let retried = client.subscribe_market("M1").unwrap();
    assert_eq!(retried.id(), Some(m1.id()));
    assert_eq!(transport.opens(&m1), 1);
}

#[test]
fn test_failed_close_still_purges() {
    let transport = MockTransport::new(Some("s1"));
    let client = client(&transport);
    let m1 = market("M1");

    transport.fail_closes(true);
    drop(client.subscribe_market("M1").unwrap());

    assert!(client.registry().wait_for_teardown(&m1, TEARDOWN_TIMEOUT));
    assert_eq!(transport.closes(&m1), 1);

    let again = client.subscribe_market("M1").unwrap();
    assert_eq!(client.registry().phase(&m1), Some(FeedPhase::Active));
    drop(again);
}

#[test]
fn test_reconnect_without_session() {
    let transport = MockTransport::new(Some("s1"));
    let client = client(&transport);
    let _card = client.subscribe_market("M1").unwrap();

    transport.set_session(None);
    assert!(matches!(
        client.reconnect_if_needed(),
        Err(FeedError::TransportUnavailable(_))
    ));
    assert_eq!(
        client.registry().phase(&market("M1")),
        Some(FeedPhase::Active)
    );
}

// --- Message Errors ---

#[test]
fn test_handle_message_errors() {
    let transport = MockTransport::new(Some("s1"));
    let client = client(&transport);

    assert!(matches!(
        client.handle_message(b"not json"),
        Err(FeedError::Deserialization(_))
    ));
    assert!(matches!(
        client.handle_message(br#"{"change":{}}"#),
        Err(FeedError::Deserialization(_))
    ));
    assert!(matches!(
        client.handle_message(br#"{"contentId":{"type":"liveEvents","id":"FBL"}}"#),
        Err(FeedError::MalformedRoute { .. })
    ));
}

#[test]
fn test_message_for_unsubscribed_feed() {
    let transport = MockTransport::new(Some("s1"));
    let client = client(&transport);

    let routed = client
        .handle_message(br#"{"contentId":{"type":"market","id":"M9"},"change":{}}"#)
        .unwrap();
    assert!(!routed);
    assert_eq!(client.registry().feed_count(), 0);
}

// --- Association Errors ---

#[test]
fn test_associate_across_families() {
    let transport = MockTransport::new(Some("s1"));
    let client = client(&transport);

    let football = client.subscribe_route(ContentRoute::live_events("FBL", 0)).unwrap();
    let tennis = client.subscribe_route(ContentRoute::live_events("TEN", 1)).unwrap();

    let root = football.subscription().unwrap();
    let result = root.associate(Arc::clone(tennis.subscription().unwrap()));
    assert!(matches!(result, Err(FeedError::AssociationMismatch { .. })));
    assert_eq!(root.associated_count(), 0);
    assert_eq!(
        client
            .registry()
            .refcount(tennis.identifier().unwrap()),
        1
    );
}

#[test]
fn test_associate_self() {
    let transport = MockTransport::new(Some("s1"));
    let client = client(&transport);

    let page = client.subscribe_route(ContentRoute::live_events("FBL", 0)).unwrap();
    let subscription = page.subscription().unwrap();
    let result = subscription.associate(Arc::clone(subscription));
    assert!(matches!(result, Err(FeedError::InvalidOperation(_))));
    assert_eq!(subscription.associated_count(), 0);
}

#[test]
fn test_paginator_on_unpaged_route() {
    let transport = MockTransport::new(Some("s1"));
    let client = client(&transport);

    let result = content_feeds::Paginator::open(
        client.registry().clone(),
        ContentRoute::market("M1"),
    );
    assert!(matches!(result, Err(FeedError::InvalidOperation(_))));
    assert_eq!(transport.total_opens(), 0);
}

#[test]
fn test_next_page_on_stale_session() {
    let transport = MockTransport::new(Some("s1"));
    let client = client(&transport);

    let mut pages = client
        .pre_live_events("soccer", None, None, Some(1), EventListSort::ByStartDate)
        .unwrap();
    pages.record_page_len(1);

    transport.set_session(Some("s2"));
    let result = pages.next_page();
    assert!(matches!(result, Err(FeedError::StaleSession { .. })));
    assert_eq!(pages.current_page(), 0);
    assert_eq!(transport.total_opens(), 1);

    client.reconnect_if_needed().unwrap();
    let page1 = pages.next_page().unwrap().unwrap().id().unwrap();
    assert!(transport
        .calls()
        .iter()
        .any(|call| matches!(call, Call::Open(id, s) if *id == page1 && s.as_str() == "s2")));
}

#[test]
fn test_next_page_past_last_index() {
    let transport = MockTransport::new(Some("s1"));
    let client = client(&transport);
    let route = ContentRoute::PreLiveEvents {
        sport_id: "soccer".to_string(),
        window: DateWindow::canonical_at(None, None, chrono::Utc::now()),
        page_index: u32::MAX,
        event_count: 1,
        sort: EventListSort::ByStartDate,
    };

    let mut pages = content_feeds::Paginator::open(client.registry().clone(), route).unwrap();
    pages.record_page_len(1);
    let result = pages.next_page();
    assert!(matches!(result, Err(FeedError::InvalidOperation(_))));
    assert_eq!(pages.current_page(), u32::MAX);
    assert_eq!(pages.pages().count(), 0);
    assert_eq!(transport.total_opens(), 1);
}

// --- Handle Edge Cases ---

#[test]
fn test_release_twice() {
    let transport = MockTransport::new(Some("s1"));
    let client = client(&transport);
    let m1 = market("M1");

    let mut handle = client.subscribe_market("M1").unwrap();
    handle.release();
    handle.release();
    drop(handle);

    assert!(client.registry().wait_for_teardown(&m1, TEARDOWN_TIMEOUT));
    assert_eq!(transport.closes(&m1), 1);
}

#[test]
fn test_recv_on_released_handle() {
    let transport = MockTransport::new(Some("s1"));
    let client = client(&transport);

    let mut handle = client.subscribe_market("M1").unwrap();
    handle.release();

    assert!(handle.recv().is_err());
    assert!(matches!(handle.try_recv(), Err(TryRecvError::Disconnected)));
    assert!(handle.drain().is_empty());
    assert_eq!(handle.id(), None);
}

#[test]
fn test_slow_consumer_detached() {
    let transport = MockTransport::new(Some("s1"));
    init_tracing();
    let config = FeedConfig {
        buffer_size: 2,
        replay_latest: false,
        ..Default::default()
    };
    let client = FeedClient::new(transport.clone(), config).unwrap();
    let m1 = market("M1");

    let slow = client.subscribe_market("M1").unwrap();
    client.registry().dispatch(&m1, serde_json::json!(1));
    client.registry().dispatch(&m1, serde_json::json!(2));

    client.registry().dispatch(&m1, serde_json::json!(3));

    let events = slow.drain();
    assert_eq!(events.len(), 3);
    assert!(matches!(events[0], FeedEvent::Connected { .. }));
    assert!(matches!(&events[1], FeedEvent::ContentUpdate { content } if *content == 1));
    assert!(matches!(
        events[2],
        FeedEvent::Dropped {
            reason: DropReason::BufferOverflow
        }
    ));
    assert_eq!(client.registry().consumer_count(&m1), 0);
    // The subscription itself is still owned by the handle.
    assert_eq!(client.registry().refcount(&m1), 1);
}

#[test]
fn test_config_rejects_zero_buffer() {
    assert!(FeedConfig::from_json_str(r#"{"buffer_size":0}"#).is_err());
    let config = FeedConfig::from_json_str(r#"{"default_event_count":25}"#).unwrap();
    assert_eq!(config.default_event_count, 25);
    assert_eq!(config.buffer_size, 1000);
}
