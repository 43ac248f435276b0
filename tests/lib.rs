//! Test suite for bulk-rs
//!
//! ## Test Categories
//!
//! ### 1. Common Utilities (`common/`)
//! Shared test infrastructure:
//! - A fully wired gateway stack (pool, database, router, orchestrator)
//! - JSON:API document factories for the sample resources
//!
//! ### 2. Integration Tests (`integration/`)
//! Tests that drive the public API across components:
//! - Bulk calls against the sample resources in both execution modes
//! - Worker affinity and the dedicated worker lifecycle
//! - Configuration loading and validation
//!
//! ## Running Tests
//!
//! ```bash
//! # Run everything
//! cargo test
//!
//! # Run only unit tests
//! cargo test --lib
//!
//! # Run integration tests
//! cargo test --test lib
//! ```

pub mod common;
pub mod integration;
