use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use super::collector::WindowSnapshot;
use super::histogram::{self, LatencyBucket};
use crate::alert::AlertDispatcher;
use crate::classify::CodeClassifier;
use crate::sink::OutputSink;

/// Derived statistics for one entry over one window.
/// Serialized as-is for the default JSON line.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsRecord {
    /// Window end (flush time), UTC
    pub timestamp: DateTime<Utc>,
    pub client_name: String,
    pub interface_name: String,
    /// Successes + failures
    pub count: u32,
    pub success_count: u32,
    pub success_rate: f64,
    /// Success-latency sum over all calls, truncated
    #[serde(rename = "successMsAver")]
    pub success_ms_avg: u32,
    pub max_ms: u32,
    pub min_ms: u32,
    pub fast_count: u32,
    /// Fast successes over all calls
    pub fast_rate: f64,
    pub fail_count: u32,
    /// Failure label → occurrences
    pub fail_distribution: BTreeMap<String, u32>,
    /// Histogram bars in bucket order, written as a label → count object
    #[serde(
        rename = "timeConsumingDistribution",
        serialize_with = "histogram::serialize_as_map"
    )]
    pub latency_distribution: Vec<LatencyBucket>,
}

/// Single consumer of the snapshot queue.
pub struct Analyzer {
    client_name: Arc<str>,
    classifier: CodeClassifier,
    fail_label_format: String,
    output: Arc<dyn OutputSink>,
    alerts: AlertDispatcher,
}

impl Analyzer {
    pub fn new(
        client_name: Arc<str>,
        classifier: CodeClassifier,
        fail_label_format: String,
        output: Arc<dyn OutputSink>,
        alerts: AlertDispatcher,
    ) -> Self {
        Self {
            client_name,
            classifier,
            fail_label_format,
            output,
            alerts,
        }
    }

    pub fn derive(&self, snapshot: &WindowSnapshot) -> StatsRecord {
        let d = &snapshot.data;
        let count = d.calls();
        let ratio = |n: u32| if count == 0 { 0.0 } else { n as f64 / count as f64 };
        // Success latency spread over every call, failures included.
        let success_ms_avg = if count == 0 {
            0
        } else {
            (d.success_ms_sum / u64::from(count)) as u32
        };

        let mut fail_distribution = BTreeMap::new();
        for (&code, &n) in &d.fail_distribution {
            let label = self.classifier.fail_label(code, &self.fail_label_format);
            *fail_distribution.entry(label).or_insert(0) += n;
        }

        StatsRecord {
            timestamp: snapshot.at,
            client_name: self.client_name.to_string(),
            interface_name: snapshot.entry.clone(),
            count,
            success_count: d.success_count,
            success_rate: ratio(d.success_count),
            success_ms_avg,
            max_ms: d.max_ms,
            min_ms: d.min_ms,
            fast_count: d.fast_count,
            fast_rate: ratio(d.fast_count),
            fail_count: d.fail_count,
            fail_distribution,
            latency_distribution: d.geometry().labelled(&d.histogram),
        }
    }

    pub async fn run(mut self, mut snapshots: mpsc::Receiver<WindowSnapshot>) {
        while let Some(snapshot) = snapshots.recv().await {
            let record = self.derive(&snapshot);
            tracing::debug!(
                entry = %record.interface_name,
                count = record.count,
                success_rate = record.success_rate,
                fast_rate = record.fast_rate,
                "window analyzed"
            );

            self.alerts.dispatch(record.clone());

            // Sinks may block on IO or caller code; keep them off this loop.
            let output = self.output.clone();
            tokio::task::spawn_blocking(move || output.emit(&record));
        }
    }
}
