//! Integration tests for bulk-rs
//!
//! These tests verify the interaction between multiple components
//! and test real system behavior without mocking.

pub mod bulk_tests;
pub mod config_validation_tests;
pub mod pool_tests;
