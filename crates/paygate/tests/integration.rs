//! # Integration Tests for Paygate
//!
//! This module contains integration tests that verify the behavior of the
//! paywall server, policy enforcement, and settlement working together.
//!
//! ## Test Organization
//!
//! - `e2e/` - End-to-end integration tests
//!   - `test_utils` - Shared helpers for building paywall routers
//!   - `paywall_test` - Full request -> policy -> settlement flow tests
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all tests
//! cargo test
//!
//! # Run only integration tests
//! cargo test --test integration
//!
//! # Run specific integration test modules
//! cargo test --test integration paywall
//! ```

// Allow expect() in tests since panicking on failures is acceptable
#![allow(clippy::expect_used)]

mod e2e;
