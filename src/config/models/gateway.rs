//! Main gateway configuration

use super::*;
use crate::utils::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};

/// Prefix of environment variables read by [`GatewayConfig::from_env`]
pub const ENV_PREFIX: &str = "BULK";

/// Main gateway configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GatewayConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Blocking worker pool
    #[serde(default)]
    pub pool: PoolConfig,
    /// Bulk endpoint
    #[serde(default)]
    pub bulk: BulkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Load from `BULK_<SECTION>__<FIELD>` variables, e.g. `BULK_POOL__MAX_WORKERS=8`.
    /// Unset fields keep their defaults.
    pub fn from_env() -> Result<Self> {
        ::config::Config::builder()
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| GatewayError::Config(format!("Failed to load environment config: {}", e)))
    }

    /// Merge two configurations, with other taking precedence
    pub fn merge(mut self, other: Self) -> Self {
        self.server = self.server.merge(other.server);
        self.pool = self.pool.merge(other.pool);
        self.bulk = self.bulk.merge(other.bulk);
        self.logging = self.logging.merge(other.logging);
        self
    }
}
