use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::histogram::BucketGeometry;
use super::registry::EntryRegistry;
use super::{Command, ReportSample};
use crate::classify::CodeClassifier;
use crate::config::EntryConfig;

// ─── Public types ────────────────────────────────────────────────

/// Running totals for one entry within the current window.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    /// Rules the histogram below was laid out with
    pub config: EntryConfig,
    pub success_count: u32,
    pub fail_count: u32,
    pub min_ms: u32,
    pub max_ms: u32,
    /// Sum of successful latencies
    pub success_ms_sum: u64,
    /// Successes at or under the fast threshold
    pub fast_count: u32,
    /// Failure status code → occurrences
    pub fail_distribution: HashMap<i32, u32>,
    /// Raw per-bucket success counts
    pub histogram: Vec<u32>,
}

/// A finished window, handed from the collector to the analyzer.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSnapshot {
    pub entry: String,
    /// Flush time that closed the window
    pub at: DateTime<Utc>,
    pub data: Accumulator,
}

/// Sole owner and writer of every accumulator.
///
/// Only ever driven by one task consuming the ingestion queue, so
/// accumulators need no locking: arrival order is the serialization.
pub struct Collector {
    registry: Arc<EntryRegistry>,
    classifier: CodeClassifier,
    accumulators: HashMap<String, Accumulator>,
}

// ─── Accumulator impl ────────────────────────────────────────────

impl Accumulator {
    pub fn new(config: EntryConfig) -> Self {
        Self {
            config,
            success_count: 0,
            fail_count: 0,
            min_ms: 0,
            max_ms: 0,
            success_ms_sum: 0,
            fast_count: 0,
            fail_distribution: HashMap::new(),
            histogram: BucketGeometry::from_config(&config).empty_counts(),
        }
    }

    pub fn calls(&self) -> u32 {
        self.success_count + self.fail_count
    }

    pub fn is_empty(&self) -> bool {
        self.calls() == 0
    }

    pub fn geometry(&self) -> BucketGeometry {
        BucketGeometry::from_config(&self.config)
    }

    fn record_success(&mut self, ms: u32) {
        if self.success_count == 0 {
            self.min_ms = ms;
            self.max_ms = ms;
        } else {
            self.min_ms = self.min_ms.min(ms);
            self.max_ms = self.max_ms.max(ms);
        }
        self.success_count += 1;
        self.success_ms_sum += u64::from(ms);

        let bucket = self.geometry().index(ms);
        self.histogram[bucket] += 1;

        if ms <= self.config.fast_less_than_ms {
            self.fast_count += 1;
        }
    }

    fn record_failure(&mut self, code: i32) {
        self.fail_count += 1;
        *self.fail_distribution.entry(code).or_insert(0) += 1;
    }
}

// ─── Collector impl ──────────────────────────────────────────────

impl Collector {
    pub fn new(registry: Arc<EntryRegistry>, classifier: CodeClassifier) -> Self {
        Self {
            registry,
            classifier,
            accumulators: HashMap::new(),
        }
    }

    /// Fold one report into its entry's accumulator, creating it on first use.
    pub fn record(&mut self, sample: ReportSample) {
        let success = self.classifier.is_success(sample.code);
        let registry = &self.registry;
        let acc = self
            .accumulators
            .entry(sample.entry)
            .or_insert_with_key(|name| Accumulator::new(registry.config(name)));

        if success {
            acc.record_success(sample.ms);
        } else {
            acc.record_failure(sample.code);
        }
    }

    /// Close the entry's window.
    ///
    /// Idle windows are not emitted. Otherwise the accumulator is swapped
    /// for a fresh one laid out with the entry's current config.
    pub fn flush(&mut self, entry: &str, at: DateTime<Utc>) -> Option<WindowSnapshot> {
        let acc = self.accumulators.get_mut(entry)?;
        if acc.is_empty() {
            return None;
        }
        let fresh = Accumulator::new(self.registry.config(entry));
        let data = std::mem::replace(acc, fresh);
        Some(WindowSnapshot {
            entry: entry.to_owned(),
            at,
            data,
        })
    }

    pub fn apply(&mut self, cmd: Command) -> Option<WindowSnapshot> {
        match cmd {
            Command::Report(sample) => {
                self.record(sample);
                None
            }
            Command::Flush { entry, at } => self.flush(&entry, at),
        }
    }

    /// Single-consumer loop over the ingestion queue.
    ///
    /// A full snapshot queue blocks here, which in turn stalls reporters
    /// once the ingestion queue fills.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        snapshots: mpsc::Sender<WindowSnapshot>,
    ) {
        while let Some(cmd) = commands.recv().await {
            let Some(snapshot) = self.apply(cmd) else {
                continue;
            };
            tracing::debug!(
                entry = %snapshot.entry,
                calls = snapshot.data.calls(),
                "window flushed"
            );
            if snapshots.send(snapshot).await.is_err() {
                tracing::warn!("snapshot queue closed, collector stopping");
                break;
            }
        }
    }
}
