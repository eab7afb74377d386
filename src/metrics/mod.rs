pub mod analyzer;
pub mod collector;
pub mod histogram;
pub mod registry;
pub mod scheduler;

pub use analyzer::{Analyzer, StatsRecord};
pub use collector::{Accumulator, Collector, WindowSnapshot};
pub use histogram::{BucketGeometry, LatencyBucket};
pub use registry::EntryRegistry;

use chrono::{DateTime, Utc};

/// A single request outcome reported by the caller.
/// This is the "write" side of the pipeline.
#[derive(Debug, Clone)]
pub struct ReportSample {
    /// e.g. "GET /api/users/:id"
    pub entry: String,
    /// Wall time of the request in milliseconds
    pub ms: u32,
    /// Status code, classified by the monitor's `CodeClassifier`
    pub code: i32,
}

/// Everything the collector consumes. Reports and flushes share one
/// queue so a flush is always ordered against in-flight reports.
#[derive(Debug, Clone)]
pub enum Command {
    Report(ReportSample),
    Flush { entry: String, at: DateTime<Utc> },
}
