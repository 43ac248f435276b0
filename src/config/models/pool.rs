//! Worker pool configuration

use super::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Blocking worker pool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum live worker threads, shared and pinned together
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Seconds before an idle shared worker is reaped
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Worker thread names are `<prefix>-<id>`
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            idle_timeout_secs: default_idle_timeout_secs(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl PoolConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn merge(mut self, other: Self) -> Self {
        if other.max_workers != default_max_workers() {
            self.max_workers = other.max_workers;
        }
        if other.idle_timeout_secs != default_idle_timeout_secs() {
            self.idle_timeout_secs = other.idle_timeout_secs;
        }
        if other.thread_name_prefix != default_thread_name_prefix() {
            self.thread_name_prefix = other.thread_name_prefix;
        }
        self
    }
}
