//! Property-based tests for points-resilience components.
//!
//! Run with: cargo test --test property_tests

pub mod cache_tags;
pub mod queue;
