//! Shared test utilities for integration tests

pub mod capture_harness;
