//! Configuration validators

use super::trait_def::Validate;
use crate::config::models::*;
use tracing::debug;

impl Validate for GatewayConfig {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating gateway configuration");

        self.server.validate()?;
        self.pool.validate()?;
        self.bulk.validate()?;
        self.logging.validate()?;

        debug!("Gateway configuration validation completed");
        Ok(())
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("Server host cannot be empty".to_string());
        }

        if self.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        if let Some(workers) = self.workers {
            if workers == 0 {
                return Err("Worker count must be greater than 0".to_string());
            }
            if workers > 1000 {
                return Err("Worker count seems too high (>1000)".to_string());
            }
        }

        if self.timeout == 0 {
            return Err("Server timeout must be greater than 0".to_string());
        }

        if self.timeout > 3600 {
            return Err("Server timeout should not exceed 1 hour".to_string());
        }

        if self.max_body_size == 0 {
            return Err("Max body size must be greater than 0".to_string());
        }

        if self.shutdown_timeout_secs > 600 {
            return Err("Shutdown timeout should not exceed 10 minutes".to_string());
        }

        Ok(())
    }
}

impl Validate for PoolConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_workers == 0 {
            return Err("Pool max_workers must be greater than 0".to_string());
        }
        if self.max_workers > 4096 {
            return Err("Pool max_workers seems too high (>4096)".to_string());
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err("Pool thread_name_prefix cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Validate for BulkConfig {
    fn validate(&self) -> Result<(), String> {
        if !self.path.starts_with('/') {
            return Err(format!("Bulk path must start with '/': {}", self.path));
        }
        if self.path.contains('{') || self.path.contains('?') {
            return Err(format!("Bulk path must be a plain path: {}", self.path));
        }
        Ok(())
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        tracing_subscriber::EnvFilter::try_new(&self.level)
            .map(|_| ())
            .map_err(|e| format!("Invalid log level '{}': {}", self.level, e))
    }
}
