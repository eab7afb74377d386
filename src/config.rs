use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

// ─── Limits & defaults ───────────────────────────────────────────

/// Longest allowed statistical cycle (5 minutes).
pub const MAX_CYCLE_MS: u64 = 300_000;
pub const DEFAULT_CYCLE_MS: u64 = 60_000;

pub const DEFAULT_SUCCESS_RATE: f64 = 0.95;
pub const DEFAULT_FAST_RATE: f64 = 0.8;

/// Fewest consecutive windows that may trigger an alert or a recovery.
pub const MIN_STREAK: usize = 3;

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_FAST_MS: u32 = 500;
pub const DEFAULT_FAIL_LABEL_FORMAT: &str = "code[%code]";

pub const MIN_BUCKET_SPLIT: usize = 3;
pub const MAX_BUCKET_SPLIT: usize = 20;
pub const DEFAULT_BUCKET_SPLIT: usize = 10;
pub const DEFAULT_BUCKET_MIN_MS: u32 = 100;
pub const DEFAULT_BUCKET_MAX_MS: u32 = 500;
/// Fallback minimum used when a custom entry config leaves it unset.
pub const CUSTOM_BUCKET_MIN_MS: u32 = 50;

// ─── Monitor-wide options ────────────────────────────────────────

/// Registration options for one reporting client.
///
/// Every field may be omitted when loading from JSON; out-of-range
/// values are pulled back to their defaults by [`MonitorConfig::normalized`].
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Name of the reporting client, echoed in every output and alert
    #[serde(default)]
    pub client_name: String,

    /// Window length in milliseconds, (0, 300 000]
    #[serde(default = "default_cycle_ms")]
    pub statistical_cycle_ms: u64,

    /// Windows below this success rate count as bad
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,

    /// Windows below this fast rate count as bad for latency
    #[serde(default = "default_fast_rate")]
    pub fast_rate: f64,

    #[serde(default = "default_streak")]
    pub alert_for_bad_success_rate_times: usize,
    #[serde(default = "default_streak")]
    pub alert_for_bad_fast_rate_times: usize,
    #[serde(default = "default_streak")]
    pub recover_for_good_success_rate_times: usize,
    #[serde(default = "default_streak")]
    pub recover_for_good_fast_rate_times: usize,

    /// Capacity of both the ingestion and the snapshot queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Fast threshold for entries without their own config
    #[serde(default = "default_fast_ms")]
    pub default_fast_ms: u32,

    /// Label for failure codes without a name; `%code` is substituted
    #[serde(default = "default_fail_label_format")]
    pub fail_label_format: String,
}

fn default_cycle_ms() -> u64 {
    DEFAULT_CYCLE_MS
}
fn default_success_rate() -> f64 {
    DEFAULT_SUCCESS_RATE
}
fn default_fast_rate() -> f64 {
    DEFAULT_FAST_RATE
}
fn default_streak() -> usize {
    MIN_STREAK
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
fn default_fast_ms() -> u32 {
    DEFAULT_FAST_MS
}
fn default_fail_label_format() -> String {
    DEFAULT_FAIL_LABEL_FORMAT.into()
}

impl MonitorConfig {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            statistical_cycle_ms: DEFAULT_CYCLE_MS,
            success_rate: DEFAULT_SUCCESS_RATE,
            fast_rate: DEFAULT_FAST_RATE,
            alert_for_bad_success_rate_times: MIN_STREAK,
            alert_for_bad_fast_rate_times: MIN_STREAK,
            recover_for_good_success_rate_times: MIN_STREAK,
            recover_for_good_fast_rate_times: MIN_STREAK,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            default_fast_ms: DEFAULT_FAST_MS,
            fail_label_format: DEFAULT_FAIL_LABEL_FORMAT.into(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    /// Clamp every option into its valid range.
    ///
    /// Only a missing client name is rejected; everything else degrades
    /// to its default.
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        if self.client_name.trim().is_empty() {
            return Err(ConfigError::MissingClientName);
        }
        if self.statistical_cycle_ms == 0 || self.statistical_cycle_ms > MAX_CYCLE_MS {
            self.statistical_cycle_ms = DEFAULT_CYCLE_MS;
        }
        if self.success_rate == 0.0 || !self.success_rate.is_finite() {
            self.success_rate = DEFAULT_SUCCESS_RATE;
        }
        if self.fast_rate == 0.0 || !self.fast_rate.is_finite() {
            self.fast_rate = DEFAULT_FAST_RATE;
        }
        for streak in [
            &mut self.alert_for_bad_success_rate_times,
            &mut self.alert_for_bad_fast_rate_times,
            &mut self.recover_for_good_success_rate_times,
            &mut self.recover_for_good_fast_rate_times,
        ] {
            *streak = (*streak).max(MIN_STREAK);
        }
        if self.queue_capacity == 0 {
            self.queue_capacity = DEFAULT_QUEUE_CAPACITY;
        }
        if self.default_fast_ms == 0 {
            self.default_fast_ms = DEFAULT_FAST_MS;
        }
        if self.fail_label_format.is_empty() {
            self.fail_label_format = DEFAULT_FAIL_LABEL_FORMAT.into();
        }
        Ok(self)
    }

    pub fn cycle(&self) -> Duration {
        Duration::from_millis(self.statistical_cycle_ms)
    }

    /// Entry config applied to names that were never configured.
    pub fn default_entry_config(&self) -> EntryConfig {
        EntryConfig {
            fast_less_than_ms: self.default_fast_ms,
            ..EntryConfig::default()
        }
    }
}

// ─── Per-entry classification rules ──────────────────────────────

/// Latency classification for one entry.
///
/// Bucket 0 counts values below `bucket_min_ms`, the last bucket counts
/// values at or above `bucket_max_ms`, and the `bucket_split - 2`
/// buckets in between evenly partition the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EntryConfig {
    #[serde(default)]
    pub fast_less_than_ms: u32,
    #[serde(default)]
    pub bucket_split: usize,
    #[serde(default)]
    pub bucket_min_ms: u32,
    #[serde(default)]
    pub bucket_max_ms: u32,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            fast_less_than_ms: DEFAULT_FAST_MS,
            bucket_split: DEFAULT_BUCKET_SPLIT,
            bucket_min_ms: DEFAULT_BUCKET_MIN_MS,
            bucket_max_ms: DEFAULT_BUCKET_MAX_MS,
        }
    }
}

impl EntryConfig {
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        if self.fast_less_than_ms == 0 {
            self.fast_less_than_ms = DEFAULT_FAST_MS;
        }
        if !(MIN_BUCKET_SPLIT..=MAX_BUCKET_SPLIT).contains(&self.bucket_split) {
            self.bucket_split = DEFAULT_BUCKET_SPLIT;
        }
        if self.bucket_max_ms == 0 {
            self.bucket_max_ms = DEFAULT_BUCKET_MAX_MS;
        }
        if self.bucket_min_ms == 0 {
            self.bucket_min_ms = CUSTOM_BUCKET_MIN_MS;
        }
        if self.bucket_max_ms <= self.bucket_min_ms {
            return Err(ConfigError::InvalidBucketRange {
                min: self.bucket_min_ms,
                max: self.bucket_max_ms,
            });
        }
        Ok(self)
    }

    /// Buckets actually allocated. A range narrower than the requested
    /// interior count gets one 1 ms interior bucket per millisecond.
    pub fn bucket_count(&self) -> usize {
        let range = self.bucket_max_ms.saturating_sub(self.bucket_min_ms) as usize;
        self.bucket_split.min(range.max(1) + 2)
    }

    /// Width of each interior bucket, floored and never zero.
    pub fn bucket_width(&self) -> u32 {
        let interior = self.bucket_count().saturating_sub(2).max(1) as u32;
        (self.bucket_max_ms.saturating_sub(self.bucket_min_ms) / interior).max(1)
    }
}
