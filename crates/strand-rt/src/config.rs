// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Worker pool configuration.

use crate::error::ConfigError;

/// Environment variable read by [`PoolConfig::from_env`].
pub const WORKERS_ENV: &str = "STRAND_WORKERS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads. 0 means one per available core.
    pub workers: usize,
    /// Worker threads are named `{thread_name}-{index}`.
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            thread_name: "strand-worker".to_string(),
        }
    }
}

impl PoolConfig {
    /// Defaults, with `STRAND_WORKERS` overriding the worker count.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var(WORKERS_ENV).ok();
        let mut config = Self::default();
        if let Some(workers) = parse_workers(raw.as_deref())? {
            config.workers = workers;
        }
        Ok(config)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Worker count with 0 resolved to the machine's parallelism.
    pub fn resolved_workers(&self) -> usize {
        if self.workers == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        } else {
            self.workers
        }
    }
}

fn parse_workers(raw: Option<&str>) -> Result<Option<usize>, ConfigError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidWorkers {
                value: value.to_string(),
            }),
    }
}
