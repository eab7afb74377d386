use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;

use crate::config::EntryConfig;
use crate::error::ConfigError;

/// Per-entry classification rules plus the set of names seen so far.
///
/// Callers write configs and names; the collector and the scheduler
/// only read. Accumulators are not here: the collector owns those.
pub struct EntryRegistry {
    default: EntryConfig,
    configs: RwLock<HashMap<String, EntryConfig>>,
    names: RwLock<BTreeSet<String>>,
}

impl EntryRegistry {
    pub fn new(default: EntryConfig) -> Self {
        Self {
            default,
            configs: RwLock::new(HashMap::new()),
            names: RwLock::new(BTreeSet::new()),
        }
    }

    /// Validate and store a config. Takes effect from the entry's next window.
    pub fn set_config(&self, name: &str, cfg: EntryConfig) -> Result<EntryConfig, ConfigError> {
        let cfg = cfg.normalized()?;
        self.configs.write().insert(name.to_owned(), cfg);
        Ok(cfg)
    }

    pub fn config(&self, name: &str) -> EntryConfig {
        self.configs.read().get(name).copied().unwrap_or(self.default)
    }

    /// Record that `name` has been reported at least once.
    pub fn touch(&self, name: &str) {
        if self.names.read().contains(name) {
            return;
        }
        self.names.write().insert(name.to_owned());
    }

    pub fn names(&self) -> Vec<String> {
        self.names.read().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_entries_use_default() {
        let reg = EntryRegistry::new(EntryConfig::default());
        assert_eq!(reg.config("GET /"), EntryConfig::default());
    }

    #[test]
    fn stored_config_is_normalized() {
        let reg = EntryRegistry::new(EntryConfig::default());
        let stored = reg
            .set_config(
                "GET /slow",
                EntryConfig {
                    fast_less_than_ms: 0,
                    bucket_split: 25,
                    bucket_min_ms: 1_000,
                    bucket_max_ms: 5_000,
                },
            )
            .unwrap();
        assert_eq!(stored.fast_less_than_ms, 500);
        assert_eq!(stored.bucket_split, 10);
        assert_eq!(reg.config("GET /slow"), stored);
    }

    #[test]
    fn rejected_config_is_not_stored() {
        let reg = EntryRegistry::new(EntryConfig::default());
        let bad = EntryConfig {
            bucket_min_ms: 500,
            bucket_max_ms: 100,
            ..EntryConfig::default()
        };
        assert!(reg.set_config("x", bad).is_err());
        assert_eq!(reg.config("x"), EntryConfig::default());
    }

    #[test]
    fn names_are_deduplicated_and_sorted() {
        let reg = EntryRegistry::new(EntryConfig::default());
        reg.touch("b");
        reg.touch("a");
        reg.touch("b");
        assert_eq!(reg.names(), ["a", "b"]);
    }
}
