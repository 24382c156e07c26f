//! Aggregation engine configuration

use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

/// Records per shard when not configured
pub const DEFAULT_SHARD_SIZE: usize = 500;

/// Tuning knobs for the aggregation engine.
///
/// Shard size and worker count only affect throughput, never the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Records classified per worker task
    pub shard_size: usize,
    /// Maximum shards in flight at once
    pub max_workers: usize,
    /// Deadline for a whole run, measured from its start
    pub timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shard_size: DEFAULT_SHARD_SIZE,
            max_workers: default_workers(),
            timeout: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shard_size(mut self, shard_size: usize) -> Self {
        self.shard_size = shard_size;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Shard size, never below one
    pub fn effective_shard_size(&self) -> usize {
        self.shard_size.max(1)
    }

    /// Worker count, never below one
    pub fn effective_workers(&self) -> usize {
        self.max_workers.max(1)
    }
}

fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
