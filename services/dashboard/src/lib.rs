//! Headless watchtower dashboard.
//!
//! Exposes the configuration and browse loop for the binary and for
//! integration tests.
pub mod browse;
pub mod config;
