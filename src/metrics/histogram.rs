use serde::Serializer;

use crate::config::EntryConfig;

/// Fixed-bucket latency layout derived from an [`EntryConfig`].
///
///   bucket 0            → value < min
///   bucket 1..=split-2  → [min + (i-1)·width, min + i·width)
///   bucket split-1      → value ≥ max
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketGeometry {
    pub min: u32,
    pub max: u32,
    pub width: u32,
    pub split: usize,
}

/// One labelled bar of a window's latency histogram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencyBucket {
    pub label: String,
    pub count: u32,
}

/// Writes buckets as a `label → count` JSON object in bucket order.
pub fn serialize_as_map<S: Serializer>(
    buckets: &[LatencyBucket],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(buckets.iter().map(|b| (&b.label, b.count)))
}

impl BucketGeometry {
    pub fn from_config(cfg: &EntryConfig) -> Self {
        Self {
            min: cfg.bucket_min_ms,
            max: cfg.bucket_max_ms,
            width: cfg.bucket_width(),
            split: cfg.bucket_count(),
        }
    }

    pub fn empty_counts(&self) -> Vec<u32> {
        vec![0; self.split]
    }

    pub fn index(&self, value: u32) -> usize {
        let last = self.split - 1;
        if value < self.min {
            0
        } else if value >= self.max {
            last
        } else {
            // Floored width can leave a remainder above the final
            // interior edge; it belongs to the last interior bucket.
            let i = 1 + ((value - self.min) / self.width) as usize;
            i.min(last - 1)
        }
    }

    /// Bounds of interior bucket `i`, the last one stretched to `max`.
    fn interior_range(&self, i: usize) -> (u32, u32) {
        let start = self.min + (i as u32 - 1) * self.width;
        let end = if i == self.split - 2 {
            self.max
        } else {
            self.min + i as u32 * self.width
        };
        (start, end)
    }

    pub fn label(&self, i: usize) -> String {
        if i == 0 {
            format!("<{}", self.min)
        } else if i >= self.split - 1 {
            format!(">={}", self.max)
        } else {
            let (start, end) = self.interior_range(i);
            format!("{start}~{end}")
        }
    }

    /// Attach labels to raw per-bucket counts.
    pub fn labelled(&self, counts: &[u32]) -> Vec<LatencyBucket> {
        counts
            .iter()
            .enumerate()
            .map(|(i, &count)| LatencyBucket {
                label: self.label(i),
                count,
            })
            .collect()
    }
}
