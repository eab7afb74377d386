use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use super::registry::EntryRegistry;
use super::Command;

/// Enqueue one flush per known entry, all stamped with `at`.
///
/// Returns `false` once the collector has gone away.
pub async fn flush_all(
    registry: &EntryRegistry,
    commands: &mpsc::Sender<Command>,
    at: DateTime<Utc>,
) -> bool {
    for entry in registry.names() {
        if commands.send(Command::Flush { entry, at }).await.is_err() {
            return false;
        }
    }
    true
}

/// Window ticker: closes every entry's window once per `cycle`.
///
/// The first tick lands one full cycle after start. Late ticks are
/// replayed rather than skipped, and a saturated ingestion queue holds
/// the ticker until there is room.
pub async fn run(registry: Arc<EntryRegistry>, commands: mpsc::Sender<Command>, cycle: Duration) {
    let mut interval = interval_at(Instant::now() + cycle, cycle);
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
    let mut ticks = IntervalStream::new(interval);

    while ticks.next().await.is_some() {
        let at = Utc::now();
        tracing::trace!(%at, "window tick");
        if !flush_all(&registry, &commands, at).await {
            tracing::warn!("ingestion queue closed, scheduler stopping");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EntryConfig;

    #[tokio::test]
    async fn flushes_every_known_entry() {
        let registry = EntryRegistry::new(EntryConfig::default());
        registry.touch("b");
        registry.touch("a");
        let (tx, mut rx) = mpsc::channel(8);
        let at = Utc::now();

        assert!(flush_all(&registry, &tx, at).await);
        drop(tx);

        let mut flushed = Vec::new();
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Flush { entry, at: stamp } => {
                    assert_eq!(stamp, at);
                    flushed.push(entry);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(flushed, ["a", "b"]);
    }

    #[tokio::test]
    async fn closed_queue_stops_flushing() {
        let registry = EntryRegistry::new(EntryConfig::default());
        registry.touch("a");
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        assert!(!flush_all(&registry, &tx, Utc::now()).await);
    }

    #[tokio::test]
    async fn ticker_flushes_after_one_cycle() {
        let registry = Arc::new(EntryRegistry::new(EntryConfig::default()));
        registry.touch("a");
        let (tx, mut rx) = mpsc::channel(8);
        let handle = tokio::spawn(run(registry, tx, Duration::from_millis(20)));

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert!(matches!(first, Some(Command::Flush { ref entry, .. }) if entry == "a"));
        handle.abort();
    }
}
