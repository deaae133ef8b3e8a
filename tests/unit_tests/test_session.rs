// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use rfid_gateway::{
    cfg::enums::ReaderMode,
    driver::{EventKind, NotificationEvent, emulated::EmulatedOp},
    errors::GatewayError,
    session::{ReaderRegistry, notify::NotificationQueue, registry::LISTENER_PORT_SEED},
};

use crate::unit_tests::{session_with_emulator, test_reader_config};

fn event(n: usize) -> NotificationEvent {
    NotificationEvent {
        timestamp: Utc::now(),
        kind: EventKind::Tag,
        tag_id: Some(format!("{n:024X}")),
        rssi_values: Vec::new(),
        reader_timestamp: None,
        reader_type: None,
        firmware_version: None,
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_operations_serialize_per_session() {
    let (session, state) = session_with_emulator(ReaderMode::Host);

    // Two operations race for the session. Each issues a pair of
    // inventories with a distinctive mask, separated by a sleep; a fair
    // mutex keeps each pair contiguous in the driver log.
    let run_pair = |mask: u8| {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            session
                .execute(async |driver| {
                    let _ = driver.inventory(mask);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    let _ = driver.inventory(mask);
                    Ok(())
                })
                .await
        })
    };

    let a = run_pair(0x01);
    let b = run_pair(0x02);
    a.await.expect("join").expect("op a");
    b.await.expect("join").expect("op b");

    let st = state.lock().expect("state");
    let masks: Vec<u8> = st
        .ops
        .iter()
        .filter_map(|op| match op {
            EmulatedOp::Inventory { mask } => Some(*mask),
            _ => None,
        })
        .collect();
    assert_eq!(masks.len(), 4);
    assert_eq!(
        masks[0], masks[1],
        "operations interleaved on the session: {masks:?}"
    );
    assert_eq!(masks[2], masks[3]);
}

#[tokio::test(start_paused = true)]
async fn start_notification_twice_fails_without_side_effects() {
    let (session, state) = session_with_emulator(ReaderMode::Notification);

    session.start_notification(20001).await.expect("first start");
    assert!(session.is_notification_active());
    assert_eq!(session.notification_port(), Some(20001));

    let err = session
        .start_notification(20002)
        .await
        .expect_err("second start");
    assert!(matches!(err, GatewayError::NotificationAlreadyActive));
    assert_eq!(session.notification_port(), Some(20001));

    let st = state.lock().expect("state");
    let starts = st.ops_of(|op| matches!(op, EmulatedOp::StartListener { .. }));
    assert_eq!(starts.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn notification_events_flow_into_the_queue() {
    let (session, state) = session_with_emulator(ReaderMode::Notification);
    session.start_notification(20001).await.expect("start");

    state
        .lock()
        .expect("state")
        .pending_events
        .extend([event(1), event(2)]);

    // Give the drain task a poll cycle.
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(session.queue().count(), 2);
    let drained = session.queue().poll_all();
    assert_eq!(drained.len(), 2);
    assert_eq!(session.queue().count(), 0);

    session.stop_notification().await.expect("stop");
    assert!(!session.is_notification_active());
    let st = state.lock().expect("state");
    assert_eq!(
        st.ops_of(|op| matches!(op, EmulatedOp::StopListener)).len(),
        1
    );
}

#[tokio::test]
async fn stop_without_start_is_not_found() {
    let (session, _state) = session_with_emulator(ReaderMode::Notification);
    let err = session.stop_notification().await.expect_err("inactive");
    assert!(matches!(err, GatewayError::NotificationInactive));
}

#[test]
fn queue_drops_oldest_beyond_capacity() {
    let queue = NotificationQueue::new();
    for n in 0..1001 {
        queue.push(event(n));
    }
    assert_eq!(queue.count(), 1000);

    let snapshot = queue.peek_all();
    assert_eq!(snapshot.len(), 1000);
    // Event 0 was dropped; the head is now event 1.
    assert_eq!(snapshot[0].tag_id, event(1).tag_id);
    assert_eq!(queue.count(), 1000, "peek must not consume");

    let drained = queue.poll_all();
    assert_eq!(drained.len(), 1000);
    assert_eq!(queue.count(), 0);
}

#[tokio::test]
async fn registry_resolves_names_and_allocates_ports() {
    let state = rfid_gateway::driver::emulated::shared_state();
    let mut cfg_a = test_reader_config(ReaderMode::Host);
    cfg_a.name = "front-desk".to_string();
    let mut cfg_b = test_reader_config(ReaderMode::Notification);
    cfg_b.name = "back-office".to_string();

    let registry = ReaderRegistry::new(
        &[cfg_a, cfg_b],
        rfid_gateway::driver::emulated::factory(state),
    );
    assert_eq!(registry.reader_count(), 2);
    assert!(registry.get("front-desk").is_ok());
    assert!(matches!(
        registry.get("nonexistent"),
        Err(GatewayError::UnknownReader(_))
    ));

    assert_eq!(registry.allocate_listener_port(), LISTENER_PORT_SEED);
    assert_eq!(registry.allocate_listener_port(), LISTENER_PORT_SEED + 1);
}

#[tokio::test]
async fn closed_sessions_reject_operations() {
    let (session, _state) = session_with_emulator(ReaderMode::Host);
    session.close().await;
    let err = session
        .execute(async |_driver| Ok(()))
        .await
        .expect_err("closed");
    assert!(matches!(err, GatewayError::SessionClosed));
}
