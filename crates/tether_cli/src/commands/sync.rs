//! Sync status command implementation.

use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tether_protocol::{Clock, SystemClock, Timestamp};
use tether_storage::FileStore;
use tether_sync::{SyncConfig, SyncMetadata};

/// Persisted sync state.
#[derive(Debug, Serialize)]
pub struct SyncStatusResult {
    /// Sync cursor in server epoch milliseconds.
    pub last_pulled_at: Option<i64>,
    /// Last successful sync in local epoch milliseconds.
    pub last_synced_at: Option<i64>,
    /// Whether a sync is due for the given interval.
    pub sync_due: bool,
}

/// Reads the sync state at `dir` as of `now`.
pub async fn read_status(
    dir: &Path,
    interval: Duration,
    now: Timestamp,
) -> Result<SyncStatusResult, Box<dyn std::error::Error>> {
    let store = FileStore::open(dir)?;
    let config = SyncConfig::default().with_sync_interval(interval);
    let metadata = SyncMetadata::load(&store, &config).await?;

    Ok(SyncStatusResult {
        last_pulled_at: metadata.last_pulled_at.map(Timestamp::as_millis),
        last_synced_at: metadata.last_synced_at.map(Timestamp::as_millis),
        sync_due: metadata.is_due(now, config.sync_interval),
    })
}

/// Runs `sync status`.
pub async fn status(
    dir: &Path,
    interval_secs: u64,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = read_status(dir, Duration::from_secs(interval_secs), SystemClock.now()).await?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("Sync status");
            println!("===========");
            println!();
            println!("  Cursor:      {}", describe(result.last_pulled_at));
            println!("  Last synced: {}", describe(result.last_synced_at));
            println!("  Sync due:    {}", if result.sync_due { "yes" } else { "no" });
        }
    }

    Ok(())
}

fn describe(millis: Option<i64>) -> String {
    match millis {
        Some(millis) => Timestamp::from_millis(millis).to_string(),
        None => "never".to_string(),
    }
}
