#![cfg_attr(not(feature = "std"), no_std)]
//! Gendy Core — no_std-ready building blocks for dynamic stochastic synthesis.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` and use the `libm` math backend
//! - `micromath`: use `micromath` approximations as the math backend
//! - `fast-math`: polynomial sine for table generation
//! - `simd`     : `wide` peak scan in the limiter
//!
//! Modules
//! - [`dsp`]          : math backend, utils (db/lin, phase wrap, one-pole coefficients, peak scan)
//! - [`bounds`]       : single-pass wrap / mirror range corrections
//! - [`distribution`] : Linear / Cauchy / Arcsine step shaping
//! - [`wavetable`]    : interpolating tables for windows and sources
//! - [`limiter`]      : lookahead peak limiter with makeup gain
//! - [`error`]        : construction-time errors
//!
//! Design
//! - Nothing on the per-sample path allocates or returns an error
//! - The limiter's delay line is the only heap allocation (`alloc`)
//! - Friendly to embedded / real-time targets

extern crate alloc;

pub mod bounds;
pub mod distribution;
pub mod dsp;
pub mod error;
pub mod limiter;
pub mod wavetable;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::bounds::{mirror, wrap, BoundPolicy};
    pub use crate::distribution::{sample_indexed, Distribution};
    pub use crate::dsp::{clamp, db_to_lin, fast_sin, finite_or_zero, kill_denormals, lerp, lin_to_db, wrap01, TAU};
    pub use crate::error::DspError;
    pub use crate::limiter::{LimiterConfig, LookaheadLimiter};
    pub use crate::wavetable::{Shape, WaveTable, TABLE_SIZE};
}

#[cfg(test)]
mod smoke {

    #[test]
    fn prelude_exists() {
        use crate::prelude::*;
        let _ = db_to_lin(-6.0);
        let env = WaveTable::new(Shape::Hann);
        let _ = env.get(0.25);
        let step = Distribution::Cauchy.sample(0.3);
        let _ = BoundPolicy::Mirror.apply(step, -1.0, 1.0);
        let mut lim = LookaheadLimiter::new(48_000.0).unwrap();
        let _ = lim.process(0.1);
    }
}
