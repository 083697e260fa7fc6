//! Behavioral properties of the offline queue.

use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tether_net::ManualConnectivity;
use tether_protocol::{HttpMethod, RequestDescriptor, Timestamp};
use tether_queue::{OfflineQueue, QueueConfig};
use tether_storage::{InMemoryStore, KeyValueStore};
use tether_testkit::{priority_strategy, FlakyStore, ManualClock, RecordingHandler, RecordingReporter};

fn post(url: impl Into<String>, priority: i32) -> RequestDescriptor {
    RequestDescriptor::new(HttpMethod::Post, url).with_priority(priority)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

proptest! {
    #[test]
    fn capacity_keeps_highest_priorities(
        priorities in prop::collection::vec(priority_strategy(), 0..40),
        max_size in 1usize..10,
    ) {
        runtime().block_on(async {
            let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1)));
            let queue = OfflineQueue::builder(
                Arc::new(InMemoryStore::new()),
                Arc::new(ManualConnectivity::new(false)),
            )
            .config(QueueConfig::default().with_max_size(max_size))
            .clock(clock.clone())
            .build();

            for (i, priority) in priorities.iter().enumerate() {
                queue.add_request(post(format!("/r{i}"), *priority)).await;
                clock.advance(Duration::from_millis(1));
                assert!(queue.len() <= max_size);
            }

            let mut expected: Vec<(usize, i32)> = priorities.iter().copied().enumerate().collect();
            expected.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            expected.truncate(max_size);
            let mut expected: Vec<String> = expected.iter().map(|(i, _)| format!("/r{i}")).collect();
            expected.sort();

            let mut kept: Vec<String> = queue.requests().into_iter().map(|r| r.url).collect();
            kept.sort();
            assert_eq!(kept, expected);
        });
    }
}

#[tokio::test]
async fn priority_scenario_drains_high_then_fifo() {
    let queue = OfflineQueue::builder(
        Arc::new(InMemoryStore::new()),
        Arc::new(ManualConnectivity::new(true)),
    )
    .build();
    queue.add_request(post("/one-a", 1)).await;
    queue.add_request(post("/five", 5)).await;
    queue.add_request(post("/one-b", 1)).await;

    let handler = Arc::new(RecordingHandler::new());
    queue.initialize(handler.clone()).await.unwrap();

    assert_eq!(handler.urls(), vec!["/five", "/one-a", "/one-b"]);
    assert!(queue.is_empty());
    queue.destroy();
}

#[tokio::test]
async fn success_on_second_attempt_removes_entry() {
    let queue = OfflineQueue::builder(
        Arc::new(InMemoryStore::new()),
        Arc::new(ManualConnectivity::new(true)),
    )
    .build();
    queue.add_request(post("/a", 0)).await;

    let handler = Arc::new(RecordingHandler::new().fail_first(1));
    let first = queue.initialize(handler.clone()).await.unwrap();
    assert_eq!(first.requeued, 1);

    let second = queue.drain().await;
    assert_eq!(second.succeeded, 1);
    assert!(queue.is_empty());

    queue.drain().await;
    assert_eq!(handler.invocations().len(), 2);
    queue.destroy();
}

#[tokio::test]
async fn exhausted_entries_are_reported() {
    let reporter = Arc::new(RecordingReporter::new());
    let queue = OfflineQueue::builder(
        Arc::new(InMemoryStore::new()),
        Arc::new(ManualConnectivity::new(true)),
    )
    .config(QueueConfig::default().with_max_attempts(2))
    .reporter(reporter.clone())
    .build();
    queue.add_request(post("/a", 0)).await;

    queue
        .initialize(Arc::new(RecordingHandler::failing()))
        .await
        .unwrap();
    assert!(reporter.reports().is_empty());
    let report = queue.drain().await;
    assert_eq!(report.dropped, 1);

    let reports = reporter.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].1.attempts, 2);
    assert_eq!(reports[0].1.request.as_ref().map(|r| r.url.as_str()), Some("/a"));
    queue.destroy();
}

#[tokio::test]
async fn connectivity_loss_stops_drain() {
    let connectivity = Arc::new(ManualConnectivity::new(true));
    let queue = OfflineQueue::builder(Arc::new(InMemoryStore::new()), connectivity.clone()).build();
    for i in 0..3 {
        queue.add_request(post(format!("/r{i}"), 0)).await;
    }

    let handler = Arc::new(RecordingHandler::new().disconnect_after(1, connectivity.clone()));
    let report = queue.initialize(handler.clone()).await.unwrap();

    assert!(report.stopped_offline);
    assert_eq!(report.attempted, 1);
    assert_eq!(queue.len(), 2);
    assert!(queue.requests().iter().all(|r| r.attempts == 0));
    queue.destroy();
}

#[tokio::test(start_paused = true)]
async fn brief_disconnect_mid_drain_still_resumes() {
    let connectivity = Arc::new(ManualConnectivity::new(true));
    let queue = OfflineQueue::builder(Arc::new(InMemoryStore::new()), connectivity.clone()).build();
    for i in 0..3 {
        queue.add_request(post(format!("/r{i}"), 0)).await;
    }

    let handler = Arc::new(RecordingHandler::new().disconnect_after(1, connectivity.clone()));
    let report = queue.initialize(handler.clone()).await.unwrap();
    assert!(report.stopped_offline);
    assert_eq!(queue.len(), 2);

    // Back online before the watcher has observed the offline state.
    connectivity.set_connected(true);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(handler.invocations().len(), 3);
    assert!(queue.is_empty());
    queue.destroy();
}

#[tokio::test(start_paused = true)]
async fn reconnect_triggers_drain() {
    let connectivity = Arc::new(ManualConnectivity::new(false));
    let queue = OfflineQueue::builder(Arc::new(InMemoryStore::new()), connectivity.clone()).build();
    let handler = Arc::new(RecordingHandler::new());
    queue.initialize(handler.clone()).await.unwrap();

    queue.add_request(post("/a", 0)).await;
    assert!(handler.invocations().is_empty());

    connectivity.set_connected(true);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(handler.urls(), vec!["/a"]);
    assert!(queue.is_empty());
    queue.destroy();
}

#[tokio::test]
async fn queue_survives_restart() {
    let store = Arc::new(InMemoryStore::new());
    let offline = Arc::new(ManualConnectivity::new(false));

    let first = OfflineQueue::builder(store.clone(), offline.clone()).build();
    let id = first.add_request(post("/a", 3)).await;
    drop(first);

    let second = OfflineQueue::builder(store.clone(), offline).build();
    assert_eq!(second.load().await.unwrap(), 1);
    assert_eq!(second.requests()[0].id, id);
    assert_eq!(second.requests()[0].priority, 3);
}

#[tokio::test]
async fn storage_failures_are_swallowed() {
    let store = Arc::new(FlakyStore::new(InMemoryStore::new()));
    store.fail_writes(true);
    let queue = OfflineQueue::builder(store.clone(), Arc::new(ManualConnectivity::new(true))).build();

    queue.add_request(post("/a", 0)).await;
    assert_eq!(queue.len(), 1);
    assert!(queue.flush().await.is_err());

    let handler = Arc::new(RecordingHandler::new());
    queue.initialize(handler.clone()).await.unwrap();
    assert_eq!(handler.urls(), vec!["/a"]);
    assert!(queue.is_empty());

    store.fail_writes(false);
    queue.flush().await.unwrap();
    assert_eq!(store.get("offline_queue").await.unwrap().as_deref(), Some("[]"));
    queue.destroy();
}
