//! # Hexworld Test Utilities
//!
//! Shared testing utilities for the world-state engine:
//! - Fixture worlds and unit records
//! - Brute-force reference oracles for paths, borders and partitions
//! - Determinism harness
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod oracles;

/// Re-export proptest for convenience.
pub use proptest;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a `RUST_LOG`-filtered subscriber for tests.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
