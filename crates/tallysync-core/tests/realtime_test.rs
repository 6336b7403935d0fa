#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tallysync_core::{
    BusEvent, ChannelStatus, DataKind, ReconnectOutcome, Severity, StatusCheck,
};
use tokio::sync::broadcast;

use common::{Harness, change, rows, table_count};

#[tokio::test]
async fn setup_twice_keeps_one_channel_per_table() {
    let h = Harness::new();

    let opened = h.realtime.setup_subscriptions().await;
    let tables = h.realtime.open_tables().await;
    assert_eq!(opened, table_count());

    assert_eq!(h.realtime.setup_subscriptions().await, 0);
    assert_eq!(h.realtime.open_tables().await, tables);
    assert_eq!(h.feed.subscribes(), table_count());
    assert_eq!(h.feed.open_channels(), table_count());
}

#[tokio::test]
async fn failed_channel_does_not_block_other_tables() {
    let h = Harness::new();
    h.feed.refuse("partners");

    let opened = h.realtime.setup_subscriptions().await;
    assert_eq!(opened, table_count() - 1);
    assert!(!h.realtime.open_tables().await.contains(&"partners".to_owned()));
}

#[tokio::test]
async fn teardown_with_nothing_open_is_harmless() {
    let h = Harness::new();
    assert_eq!(h.realtime.teardown().await, 0);
    assert_eq!(h.feed.unsubscribes(), 0);
}

#[tokio::test]
async fn notification_invalidates_before_announcing() {
    let h = Harness::new();
    h.gateway.set_rows(DataKind::Transactions, rows(&[1]));
    h.realtime.setup_subscriptions().await;
    h.cache.get(DataKind::Transactions).await;
    h.cache.get(DataKind::UserBalances).await;
    h.cache.get(DataKind::AgencyBalances).await;
    h.cache.get(DataKind::Users).await;

    let mut events = h.bus.subscribe();
    h.feed.emit("transactions", change("transactions"));

    let mut announced = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let BusEvent::DataUpdated { kind, .. } = &*event {
            assert!(!h.cache.is_populated(*kind));
            announced.push(*kind);
        }
        if let BusEvent::Domain(domain) = &*event {
            assert_eq!(domain.name, "transactions_changed");
            assert!(domain.change.is_some());
        }
    }

    assert_eq!(
        announced,
        vec![
            DataKind::Transactions,
            DataKind::UserBalances,
            DataKind::AgencyBalances
        ]
    );
    // Unrelated kinds stay cached.
    assert!(h.cache.is_populated(DataKind::Users));
}

#[tokio::test]
async fn disabled_realtime_does_not_subscribe() {
    let h = Harness::new();
    h.realtime.setup_subscriptions().await;

    assert_eq!(h.realtime.disable().await, table_count());
    assert!(h.realtime.is_disabled());
    assert_eq!(h.realtime.setup_subscriptions().await, 0);
    assert_eq!(h.realtime.force_reconnect().await, ReconnectOutcome::Disabled);
    assert_eq!(h.realtime.check_status().await, StatusCheck::Disabled);

    assert_eq!(h.realtime.enable().await, table_count());
    assert_eq!(h.realtime.subscription_count().await, table_count());
}

#[tokio::test(start_paused = true)]
async fn resubscribe_calls_100ms_apart_run_one_cycle() {
    let h = Harness::new();
    h.realtime.setup_subscriptions().await;
    h.cache.get(DataKind::Users).await;

    let first = tokio::spawn({
        let realtime = h.realtime.clone();
        async move { realtime.resubscribe().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(h.realtime.is_reconnecting());
    assert_eq!(
        h.realtime.resubscribe().await,
        ReconnectOutcome::AlreadyReconnecting
    );

    assert_eq!(
        first.await.unwrap(),
        ReconnectOutcome::Completed {
            channels: table_count()
        }
    );
    assert!(!h.realtime.is_reconnecting());
    assert_eq!(h.feed.unsubscribes(), table_count());
    assert_eq!(h.feed.subscribes(), 2 * table_count());
    // Full resync: every kind was dropped.
    assert!(!h.cache.is_populated(DataKind::Users));
}

#[tokio::test(start_paused = true)]
async fn concurrent_force_reconnects_run_one_cycle() {
    let h = Harness::new();
    h.realtime.setup_subscriptions().await;

    let mut events = h.bus.subscribe();

    let (a, b) = tokio::join!(h.realtime.force_reconnect(), h.realtime.force_reconnect());

    let completed = [a, b].iter().filter(|o| o.is_completed()).count();
    assert_eq!(completed, 1);
    assert!([a, b].contains(&ReconnectOutcome::AlreadyReconnecting));
    assert_eq!(h.feed.unsubscribes(), table_count());
    assert_eq!(h.feed.subscribes(), 2 * table_count());
    assert_eq!(global_refreshes(&mut events), 1);
}

#[tokio::test(start_paused = true)]
async fn completed_cycle_requests_one_global_refresh() {
    let h = Harness::new();
    h.realtime.setup_subscriptions().await;
    h.cache.get(DataKind::Partners).await;
    let mut events = h.bus.subscribe();

    assert!(h.realtime.force_reconnect().await.is_completed());
    assert_eq!(global_refreshes(&mut events), 1);
    assert!(!h.cache.is_populated(DataKind::Partners));

    assert!(h.realtime.resubscribe().await.is_completed());
    assert_eq!(global_refreshes(&mut events), 1);
}

#[tokio::test(start_paused = true)]
async fn reconnect_phase_is_observable() {
    let h = Harness::new();
    let mut phase = h.realtime.phase();
    assert!(!phase.borrow_and_update().is_reconnecting());

    let cycle = tokio::spawn({
        let realtime = h.realtime.clone();
        async move { realtime.force_reconnect().await }
    });

    phase.changed().await.unwrap();
    assert!(phase.borrow_and_update().is_reconnecting());
    cycle.await.unwrap();
    assert!(!phase.borrow().is_reconnecting());
}

#[tokio::test(start_paused = true)]
async fn status_checks_within_window_sample_once() {
    let h = Harness::new();

    assert_eq!(
        h.realtime.check_status().await,
        StatusCheck::Healthy { channels: 0 }
    );
    for _ in 0..5 {
        assert_eq!(h.realtime.check_status().await, StatusCheck::Debounced);
    }
    assert_eq!(h.feed.connection_checks.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(10)).await;
    assert_ne!(h.realtime.check_status().await, StatusCheck::Debounced);
    assert_eq!(h.feed.connection_checks.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn every_channel_failed_forces_reconnect() {
    let h = Harness::new();
    h.realtime.setup_subscriptions().await;
    h.feed.set_all_status(ChannelStatus::Errored);

    let status = h.realtime.check_status().await;
    assert_eq!(
        status,
        StatusCheck::Reconnected(ReconnectOutcome::Completed {
            channels: table_count()
        })
    );
    assert_eq!(h.feed.unsubscribes(), table_count());
}

#[tokio::test(start_paused = true)]
async fn partial_channel_failure_is_tolerated() {
    let h = Harness::new();
    h.realtime.setup_subscriptions().await;
    h.feed.set_status("recharges", ChannelStatus::Closed);

    assert_eq!(
        h.realtime.check_status().await,
        StatusCheck::Degraded {
            failed: 1,
            total: table_count()
        }
    );
    assert_eq!(h.feed.unsubscribes(), 0);
    assert_eq!(h.feed.subscribes(), table_count());
}

#[tokio::test(start_paused = true)]
async fn no_channels_and_disconnected_forces_reconnect() {
    let h = Harness::new();
    h.feed.set_connected(false);

    let status = h.realtime.check_status().await;
    assert_eq!(
        status,
        StatusCheck::Reconnected(ReconnectOutcome::Completed {
            channels: table_count()
        })
    );
}

#[tokio::test]
async fn emergency_cleanup_disables_and_clears() {
    let h = Harness::new();
    h.realtime.setup_subscriptions().await;
    h.cache.get(DataKind::Partners).await;
    let mut events = h.bus.subscribe();

    h.realtime.emergency_cleanup().await;

    assert!(h.realtime.is_disabled());
    assert!(!h.realtime.is_reconnecting());
    assert_eq!(h.realtime.subscription_count().await, 0);
    assert_eq!(h.feed.disconnect_calls.load(Ordering::SeqCst), 1);
    assert!(!h.cache.is_populated(DataKind::Partners));

    let toast = events.try_recv().unwrap();
    assert!(matches!(
        &*toast,
        BusEvent::Toast {
            severity: Severity::Warning,
            ..
        }
    ));

    // Stays down until explicitly re-enabled.
    assert_eq!(h.realtime.setup_subscriptions().await, 0);
}

#[tokio::test(start_paused = true)]
async fn emergency_during_cool_down_prevents_resubscribe() {
    let h = Harness::new();
    h.realtime.setup_subscriptions().await;

    let cycle = tokio::spawn({
        let realtime = h.realtime.clone();
        async move { realtime.resubscribe().await }
    });
    tokio::time::sleep(Duration::from_millis(500)).await;
    h.realtime.emergency_cleanup().await;

    assert_eq!(cycle.await.unwrap(), ReconnectOutcome::Disabled);
    assert_eq!(h.feed.open_channels(), 0);
    assert_eq!(h.feed.subscribes(), table_count());
}

#[tokio::test(start_paused = true)]
async fn aborted_cycle_requests_no_global_refresh() {
    let h = Harness::new();
    h.realtime.setup_subscriptions().await;
    let mut events = h.bus.subscribe();

    let cycle = tokio::spawn({
        let realtime = h.realtime.clone();
        async move { realtime.resubscribe().await }
    });
    tokio::time::sleep(Duration::from_millis(500)).await;
    h.realtime.emergency_cleanup().await;

    assert_eq!(cycle.await.unwrap(), ReconnectOutcome::Disabled);
    assert_eq!(global_refreshes(&mut events), 0);
}

/// Drain `events`, counting global refresh requests.
fn global_refreshes(events: &mut broadcast::Receiver<Arc<BusEvent>>) -> usize {
    let mut count = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(&*event, BusEvent::GlobalRefreshRequested) {
            count += 1;
        }
    }
    count
}
