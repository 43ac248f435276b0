//! Configuration data models

pub mod bulk;
pub mod gateway;
pub mod logging;
pub mod pool;
pub mod server;

pub use bulk::*;
pub use gateway::*;
pub use logging::*;
pub use pool::*;
pub use server::*;

/// Default values for configuration
pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// Default server port
pub fn default_port() -> u16 {
    8000
}

/// Default timeout in seconds
pub fn default_timeout() -> u64 {
    30
}

/// Default maximum body size in bytes
pub fn default_max_body_size() -> usize {
    10 * 1024 * 1024 // 10MB
}

/// Grace period for in-flight requests on shutdown
pub fn default_shutdown_timeout_secs() -> u64 {
    30
}

/// Default worker pool capacity
pub fn default_max_workers() -> usize {
    40
}

/// Seconds a shared worker may sit idle before it is reaped
pub fn default_idle_timeout_secs() -> u64 {
    10
}

pub fn default_thread_name_prefix() -> String {
    "bulk-worker".to_string()
}

pub fn default_bulk_path() -> String {
    "/api/v1/bulk/".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_log_level() -> String {
    "info".to_string()
}
