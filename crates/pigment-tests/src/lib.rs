//! # pigment-tests
//!
//! Test harness for pigment.
//!
//! This crate provides:
//! - Seeded tile generators for every kernel pixel layout
//! - Parity checks between the generic kernels and the ones selected for
//!   the running CPU
//! - Logging setup for test binaries
//!
//! ## Test Categories
//!
//! 1. **Kernel Parity**: every composite op, generic vs dispatched
//! 2. **Depth Agreement**: the same blend at 8, 16 and 32-bit float
//! 3. **Scaler Round Trips**: 8 to 16 to 8 bit without loss
//! 4. **Cache Concurrency**: many workers, one cache
//! 5. **Invalidation**: color space destruction purges transforms

pub mod parity;
pub mod patterns;

pub use parity::{KernelParity, ParityCase, ParityError, compare_composite};
pub use patterns::{TilePattern, generate_mask, generate_tile};

/// Route `tracing` output to the test harness
///
/// Honors `RUST_LOG`; defaults to warnings only. Safe to call from every
/// test.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
