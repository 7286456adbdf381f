//! Periodic eviction of idle cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::reader::LogReader;

/// Default time an unused cache entry is kept.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Default interval between eviction sweeps.
pub const DEFAULT_JANITOR_INTERVAL: Duration = Duration::from_secs(300);

/// Spawn a task that evicts cache entries idle for longer than `ttl` every
/// `interval`, until `cancel` fires.
pub fn spawn_janitor(
    reader: Arc<LogReader>,
    interval: Duration,
    ttl: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let evicted = reader.cache().evict_idle(ttl);
                    if evicted > 0 {
                        tracing::debug!(evicted, "Evicted idle log cache entries");
                    }
                }
            }
        }
        tracing::debug!("Cache janitor stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::{LogCache, LogFile, LogPaths, ReaderLimits};
    use crate::settings::{AppSettings, SettingsStore};

    #[tokio::test]
    async fn test_janitor_evicts_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("error.log"), "a\n").unwrap();
        let reader = Arc::new(LogReader::new(
            LogPaths::new(dir.path().join("error.log"), dir.path().join("access.log")),
            LogCache::default(),
            Arc::new(SettingsStore::new(dir.path().join("config.json"), AppSettings::default())),
            ReaderLimits::default(),
        ));
        reader.snapshot(LogFile::Error).await.unwrap();
        assert_eq!(reader.cache().stats().entries, 1);

        let cancel = CancellationToken::new();
        let handle = spawn_janitor(
            Arc::clone(&reader),
            Duration::from_millis(20),
            Duration::ZERO,
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(reader.cache().stats().entries, 0);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
