//! Process lifecycle: the service lock file and the non-sidecar inactivity
//! watchdog.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

pub const LOCK_FILE_NAME: &str = ".forge-service.lock";
pub const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(90);
const WATCHDOG_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct LockFileContents {
    port: u16,
    pid: u32,
    #[serde(rename = "startedAt")]
    started_at: chrono::DateTime<chrono::Utc>,
}

/// Write the lock file at `dir`, recording the listening port and this
/// process's pid.
pub fn write_lock_file(dir: &Path, port: u16) -> std::io::Result<PathBuf> {
    let path = dir.join(LOCK_FILE_NAME);
    let contents = LockFileContents {
        port,
        pid: std::process::id(),
        started_at: chrono::Utc::now(),
    };
    let json = serde_json::to_string_pretty(&contents).expect("lock file contents always serialize");
    std::fs::write(&path, json)?;
    Ok(path)
}

/// Remove the lock file, ignoring a missing file (already cleaned up).
pub fn remove_lock_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(error = %e, path = %path.display(), "failed to remove lock file");
        }
    }
}

/// Spawn the 90-second inactivity watchdog. Ticks every 10 seconds; once
/// `last_activity` has been stale for [`WATCHDOG_TIMEOUT`], triggers
/// `shutdown` and exits the loop. Only meaningful in non-sidecar mode.
pub fn spawn_watchdog(last_activity: Arc<parking_lot::Mutex<std::time::Instant>>, shutdown: Arc<tokio::sync::Notify>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(WATCHDOG_POLL_INTERVAL);
        loop {
            interval.tick().await;
            let idle = last_activity.lock().elapsed();
            if idle >= WATCHDOG_TIMEOUT {
                tracing::info!(idle_secs = idle.as_secs(), "inactivity watchdog firing, shutting down");
                shutdown.notify_waiters();
                return;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_remove_lock_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lock_file(dir.path(), 8001).unwrap();
        assert!(path.exists());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"port\": 8001"));
        assert!(contents.contains(&std::process::id().to_string()));

        remove_lock_file(&path);
        assert!(!path.exists());
    }

    #[test]
    fn remove_missing_lock_file_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        remove_lock_file(&dir.path().join(LOCK_FILE_NAME));
    }
}
