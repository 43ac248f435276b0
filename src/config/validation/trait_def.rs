//! The `Validate` trait

use crate::utils::error::GatewayError;

/// Validation for configuration sections
pub trait Validate {
    /// Describe the first problem found, if any
    fn validate(&self) -> Result<(), String>;

    /// Validate and report failures as a configuration error for `section`
    fn check(&self, section: &str) -> Result<(), GatewayError> {
        self.validate()
            .map_err(|e| GatewayError::Config(format!("{} config error: {}", section, e)))
    }
}
