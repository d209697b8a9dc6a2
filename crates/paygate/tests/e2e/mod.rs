//! End-to-end tests exercising the paywall router in-process.

pub mod test_utils;

mod paywall_test;
