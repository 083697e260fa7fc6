//! Last-write-wins reconciliation properties.

use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tether_protocol::{ChangeSet, PullResponse, Timestamp};
use tether_storage::InMemoryStore;
use tether_sync::{LocalStore, MemoryLocalStore, MockRemote, SyncConfig, SyncEngine};
use tether_testkit::{record_strategy, FlakyStore, ManualClock};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

proptest! {
    #[test]
    fn newer_remote_replaces_local(
        local in record_strategy(),
        remote_at in 0i64..2_000,
        remote_title in "[a-z]{1,8}",
    ) {
        let mut remote = local.clone();
        remote.updated_at = Timestamp::from_millis(remote_at);
        remote.fields.insert("title".into(), remote_title.into());

        let (before, after) = runtime().block_on(async {
            let store = Arc::new(MemoryLocalStore::new());
            store
                .transaction(|txn| {
                    txn.apply_remote("notes", local.clone());
                    Ok(())
                })
                .unwrap();

            let source = Arc::new(MockRemote::new());
            let mut changes = ChangeSet::new();
            changes.table_mut("notes").updated.push(remote.clone());
            source.push_pull_response(PullResponse::new(changes, Timestamp::from_millis(5_000)));

            let engine = SyncEngine::builder(store.clone(), source, Arc::new(InMemoryStore::new()))
                .open()
                .await;
            engine.pull_changes().await.unwrap();
            let after = store.get("notes", &local.id).unwrap().unwrap().record;
            (local.clone(), after)
        });

        if remote.updated_at > before.updated_at {
            prop_assert_eq!(after, remote);
        } else {
            prop_assert_eq!(after, before);
        }
    }
}

#[tokio::test]
async fn sync_becomes_due_after_interval() {
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_000)));
    let engine = SyncEngine::builder(
        Arc::new(MemoryLocalStore::new()),
        Arc::new(MockRemote::new()),
        Arc::new(InMemoryStore::new()),
    )
    .config(SyncConfig::default().with_sync_interval(Duration::from_secs(60)))
    .clock(clock.clone())
    .open()
    .await;

    assert!(engine.is_sync_due());
    engine.synchronize().await.unwrap();
    assert!(!engine.is_sync_due());

    clock.advance(Duration::from_secs(60));
    assert!(!engine.is_sync_due());
    clock.advance(Duration::from_millis(1));
    assert!(engine.is_sync_due());
}

#[tokio::test]
async fn metadata_write_failures_do_not_fail_sync() {
    let kv = Arc::new(FlakyStore::new(InMemoryStore::new()));
    kv.fail_writes(true);
    let source = Arc::new(MockRemote::new());
    source.push_pull_response(PullResponse::new(ChangeSet::new(), Timestamp::from_millis(10)));

    let engine = SyncEngine::builder(Arc::new(MemoryLocalStore::new()), source, kv.clone())
        .open()
        .await;
    let report = engine.synchronize().await.unwrap();
    assert_eq!(report.cursor, Timestamp::from_millis(10));
    assert_eq!(engine.last_pulled_at(), Some(Timestamp::from_millis(10)));
}

#[tokio::test]
async fn concurrent_synchronize_calls_run_one_at_a_time() {
    let source = Arc::new(MockRemote::new());
    source.push_pull_response(PullResponse::new(ChangeSet::new(), Timestamp::from_millis(10)));
    source.push_pull_response(PullResponse::new(ChangeSet::new(), Timestamp::from_millis(20)));

    let engine = SyncEngine::builder(
        Arc::new(MemoryLocalStore::new()),
        source.clone(),
        Arc::new(InMemoryStore::new()),
    )
    .open()
    .await;

    let (a, b) = tokio::join!(engine.synchronize(), engine.synchronize());
    a.unwrap();
    b.unwrap();

    let cursors: Vec<_> = source
        .pull_requests()
        .into_iter()
        .map(|r| r.last_pulled_at)
        .collect();
    assert_eq!(cursors, vec![None, Some(Timestamp::from_millis(10))]);
    assert_eq!(engine.stats().cycles_completed, 2);
}
