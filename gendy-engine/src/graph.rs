//! Realtime synthesis graph core.
//!
//! This module defines the minimal `Generator` trait and a lightweight `Engine<G>`
//! wrapper that owns a generator (voice), tracks sample rate and time, and
//! produces one **mono** sample at a time with zero heap work per sample.
//!
//! Design goals
//! - No dynamic allocations in the audio thread
//! - SR changes handled lazily (if the host reconfigures), with cheap branching
//! - Generic over the voice type, so voices can be swapped without trait objects

use tracing::debug;

/// Anything that can generate one sample at a time.
pub trait Generator {
    /// Called when the engine is (re)initialized or when the sample rate changes.
    fn reset(&mut self, sr: f32);

    /// Generate the next mono sample. Implementations should assume the sample
    /// rate has been communicated via `reset`.
    fn next(&mut self) -> f32;
}

/// Lightweight realtime engine that owns a generator.
///
/// The audio callback should call `next(sr)` for every output sample. If the
/// `sr` reported by the host changes, the engine will call `reset(sr)` on the
/// inner generator once and continue.
#[derive(Debug)]
pub struct Engine<G: Generator> {
    sr: f32,
    frames: u64,
    gen: G,
}

impl<G: Generator> Engine<G> {
    /// Construct with an already-configured generator and communicate `sr` to it.
    #[inline]
    pub fn new(mut gen: G, sr: f32) -> Self {
        gen.reset(sr);
        Self { sr, frames: 0, gen }
    }

    /// Produce **one** mono sample at the given sample rate.
    ///
    /// If `sr` differs from the current engine `sr`, we update and call `reset(sr)`.
    #[inline]
    pub fn next(&mut self, sr: f32) -> f32 {
        if sr != self.sr {
            debug!(from = self.sr, to = sr, "sample rate changed, resetting generator");
            self.sr = sr;
            self.gen.reset(sr);
        }
        self.frames += 1;
        self.gen.next()
    }

    /// Fill `out` at the current sample rate.
    #[inline]
    pub fn render(&mut self, out: &mut [f32]) {
        let sr = self.sr;
        for s in out.iter_mut() {
            *s = self.next(sr);
        }
    }

    /// Return the engine’s current sample rate.
    #[inline] pub fn sample_rate(&self) -> f32 { self.sr }

    /// Samples produced since this engine was created.
    #[inline] pub fn frames(&self) -> u64 { self.frames }

    /// Elapsed time in seconds at the current sample rate.
    #[inline] pub fn time(&self) -> f64 { self.frames as f64 / f64::from(self.sr) }

    /// Replace the inner generator; the new one is reset to the current rate.
    #[inline]
    pub fn swap_generator(&mut self, mut gen: G) {
        gen.reset(self.sr);
        self.gen = gen;
    }

    /// Inner generator, for reading meters.
    #[inline] pub fn generator(&self) -> &G { &self.gen }

    /// Get a mutable reference to the inner generator for live parameter tweaks.
    #[inline] pub fn generator_mut(&mut self) -> &mut G { &mut self.gen }
}
