//! `INFO` statistics snapshots

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;

/// A parsed `INFO` reply.
///
/// Keeps the raw text next to the `key:value` fields; section headers
/// (`# Memory`) and blank lines are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoSnapshot {
    pub fields: BTreeMap<String, String>,
    #[serde(skip)]
    pub raw: String,
}

impl InfoSnapshot {
    pub fn parse(raw: &str) -> Self {
        let fields = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        Self {
            fields,
            raw: raw.to_string(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|value| value.parse().ok())
    }

    /// Memory usage from this snapshot.
    ///
    /// `used_memory` is required; `used_memory_peak` is missing on old
    /// servers and falls back to `used_memory`.
    pub fn memory(&self) -> Result<MemorySample> {
        let used = self
            .get("used_memory")
            .context("INFO reply has no used_memory field")?
            .parse::<u64>()
            .context("used_memory is not an integer")?;

        let peak = self.get_u64("used_memory_peak").unwrap_or(used);

        Ok(MemorySample { used, peak })
    }
}

/// Used and peak memory in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemorySample {
    pub used: u64,
    pub peak: u64,
}
