use thiserror::Error;

/// Rejected configuration, surfaced when a monitor or entry is registered.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("a client name must be registered for this reporting type")]
    MissingClientName,

    #[error("bucket max ({max}ms) must be greater than bucket min ({min}ms)")]
    InvalidBucketRange { min: u32, max: u32 },

    #[error("failed to read config file {path}: {detail}")]
    Read { path: String, detail: String },

    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("monitor must be started inside a tokio runtime")]
    NoRuntime,

    #[error("monitor ingestion queue is closed")]
    Closed,
}
