//! Flexible Deployment Fuzz Harness
//!
//! Reusable property-based testing infrastructure for the simulator crates.
//! Provides domain generators (range strings, satellite designs, orbits,
//! strategies, scenario cases) and a seeded case runner.
//!
//! # Usage
//!
//! ```rust
//! use fuzz_harness::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn my_fuzz_test(design in satellite_design()) {
//!         prop_assert!(design.diameter_m > 0.0);
//!     }
//! }
//! ```

pub mod generators;
pub mod runner;

pub mod prelude {
    pub use crate::generators::*;
    pub use crate::runner::{FuzzConfig, FuzzResult, FuzzRunner};
    pub use proptest::prelude::*;
}

// Re-export proptest for convenience
pub use proptest;
