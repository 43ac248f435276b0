//! Common test utilities for bulk-rs
//!
//! # Usage
//!
//! ```rust
//! use crate::common::{TestGateway, fixtures::ParentFactory};
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let gateway = TestGateway::new();
//!     gateway.seed_parents(3).await;
//!     // ...
//! }
//! ```

pub mod fixtures;

pub use fixtures::{ChildFactory, ParentFactory, TestGateway};

/// Unwrap the error of a result that must have failed
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    };
}
