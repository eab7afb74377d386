//! In-process request quality monitor.
//!
//! Callers [`Monitor::report`] individual outcomes (entry name, latency,
//! status code). A single collector task folds them into per-entry
//! windows; a ticker closes the windows every statistical cycle; an
//! analyzer task turns each closed window into a [`StatsRecord`] and
//! hands it to the output sink and to a per-entry alert evaluator.
//!
//! ```text
//! report ─┐
//!         ├─▶ ingestion queue ─▶ Collector ─▶ snapshot queue ─▶ Analyzer ─┬─▶ OutputSink
//! ticker ─┘                                                              └─▶ alerts ─▶ AlertSink
//! ```

pub mod alert;
pub mod classify;
pub mod config;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod sink;

pub use alert::{AlertEvent, AlertKind, AlertStatus};
pub use classify::{CodeClassifier, CodeFeature};
pub use config::{EntryConfig, MonitorConfig};
pub use error::{ConfigError, MonitorError};
pub use metrics::{LatencyBucket, StatsRecord};
pub use monitor::{Monitor, MonitorBuilder};
pub use sink::{AlertSink, OutputSink};
