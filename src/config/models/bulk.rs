//! Bulk endpoint configuration

use super::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Route of the bulk endpoint
    #[serde(default = "default_bulk_path")]
    pub path: String,
    /// Atomicity when the caller does not pass `is_atomic`
    #[serde(default = "default_true")]
    pub default_atomic: bool,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            path: default_bulk_path(),
            default_atomic: true,
        }
    }
}

impl BulkConfig {
    pub fn merge(mut self, other: Self) -> Self {
        if other.path != default_bulk_path() {
            self.path = other.path;
        }
        if !other.default_atomic {
            self.default_atomic = false;
        }
        self
    }
}
