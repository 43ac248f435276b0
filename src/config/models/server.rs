//! HTTP listener configuration

use super::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where and how the gateway listens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// actix worker threads; `None` means one per CPU
    #[serde(default)]
    pub workers: Option<usize>,
    /// Seconds a client has to deliver the request head
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Largest accepted JSON body, bulk payloads included
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    /// Seconds in-flight requests get to finish after a stop signal
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
            timeout: default_timeout(),
            max_body_size: default_max_body_size(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl ServerConfig {
    /// Overlay `other`, keeping our value wherever `other` is still the default
    pub fn merge(mut self, other: Self) -> Self {
        let defaults = Self::default();
        if other.host != defaults.host {
            self.host = other.host;
        }
        if other.port != defaults.port {
            self.port = other.port;
        }
        if other.workers.is_some() {
            self.workers = other.workers;
        }
        if other.timeout != defaults.timeout {
            self.timeout = other.timeout;
        }
        if other.max_body_size != defaults.max_body_size {
            self.max_body_size = other.max_body_size;
        }
        if other.shutdown_timeout_secs != defaults.shutdown_timeout_secs {
            self.shutdown_timeout_secs = other.shutdown_timeout_secs;
        }
        self
    }

    /// `host:port` for binding
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get)
    }

    pub fn client_request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
