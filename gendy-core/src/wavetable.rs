//! Fixed-size lookup tables for grain windows and oscillator sources.
//!
//! A [`WaveTable`] holds [`TABLE_SIZE`] samples of one [`Shape`] and is read with
//! linear interpolation. The table is periodic: the sample after the last one is the
//! first one, so reads near the top of the range never run past the end.
//!
//! Shapes
//! - `Sine`     : one period, range [-1, 1]
//! - `Triangle` : 0 → 1 at the midpoint → 0, range [0, 1]
//! - `Hann`     : raised cosine window
//! - `Welch`    : parabolic window
//! - `Tukey`    : flat-top window with cosine tapers (α = 0.5)
//!
//! Switching shapes regenerates the table in place with no blending; a switch in the
//! middle of a grain is audible by nature.

use crate::dsp::{fast_sin, m_cos, m_floor, TAU};
use core::f32::consts::PI;

pub const TABLE_SIZE: usize = 2048;

/// Taper ratio of the Tukey window.
const TUKEY_ALPHA: f32 = 0.5;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Shape {
    Sine,
    #[default]
    Triangle,
    Hann,
    Welch,
    Tukey,
}

impl Shape {
    pub const ALL: [Shape; 5] = [Shape::Sine, Shape::Triangle, Shape::Hann, Shape::Welch, Shape::Tukey];

    /// Selector index in declaration order (0 = Sine … 4 = Tukey).
    #[inline]
    pub fn from_index(i: u32) -> Option<Self> {
        Self::ALL.get(i as usize).copied()
    }

    /// Inclusive value range produced by the generator.
    #[inline]
    pub fn range(self) -> (f32, f32) {
        match self {
            Shape::Sine => (-1.0, 1.0),
            _ => (0.0, 1.0),
        }
    }

    /// Closed-form value of sample `i` in a table of `n` samples.
    fn value(self, i: usize, n: usize) -> f32 {
        let x = i as f32;
        let nf = n as f32;
        match self {
            Shape::Sine => fast_sin(TAU * x / nf),
            Shape::Triangle => {
                let ramp = 2.0 * x / nf;
                if i < n / 2 { ramp } else { 2.0 - ramp }
            }
            Shape::Hann => 0.5 * (1.0 - m_cos(TAU * x / nf)),
            Shape::Welch => {
                let half = nf / 2.0;
                let t = (x - half) / half;
                1.0 - t * t
            }
            Shape::Tukey => {
                let a = TUKEY_ALPHA;
                let p1 = a * nf / 2.0;
                let p2 = nf * (1.0 - a / 2.0);
                if x < p1 {
                    0.5 * (1.0 + m_cos(PI * (2.0 * x / (a * nf) - 1.0)))
                } else if x <= p2 {
                    1.0
                } else {
                    0.5 * (1.0 + m_cos(PI * (2.0 * x / (a * nf) - 2.0 / a + 1.0)))
                }
            }
        }
    }
}

/// Interpolating lookup table over a [`Shape`].
#[derive(Clone, Debug)]
pub struct WaveTable {
    table: [f32; TABLE_SIZE],
    shape: Shape,
}

impl Default for WaveTable {
    fn default() -> Self {
        Self::new(Shape::Sine)
    }
}

impl WaveTable {
    pub fn new(shape: Shape) -> Self {
        let mut t = Self { table: [0.0; TABLE_SIZE], shape };
        t.fill();
        t
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Regenerate for `shape`; no-op when the shape is unchanged.
    #[inline]
    pub fn switch_shape(&mut self, shape: Shape) {
        if self.shape != shape {
            self.shape = shape;
            self.fill();
        }
    }

    fn fill(&mut self) {
        let shape = self.shape;
        for (i, v) in self.table.iter_mut().enumerate() {
            *v = shape.value(i, TABLE_SIZE);
        }
    }

    /// Raw sample at integer position `i` (reduced modulo the table size).
    #[inline]
    pub fn at(&self, i: usize) -> f32 {
        self.table[i % TABLE_SIZE]
    }

    /// Interpolated read at a continuous table-space index.
    ///
    /// Any finite index is accepted; it is reduced modulo [`TABLE_SIZE`].
    #[inline]
    pub fn index(&self, x: f32) -> f32 {
        let fl = m_floor(x);
        let frac = x - fl;
        // rem_euclid keeps negative indices inside the table as well
        let lo = (fl as i64).rem_euclid(TABLE_SIZE as i64) as usize;
        let hi = if lo + 1 == TABLE_SIZE { 0 } else { lo + 1 };
        (1.0 - frac) * self.table[lo] + frac * self.table[hi]
    }

    /// Interpolated read at normalized position `x`.
    ///
    /// Precondition: `x ∈ [0, 1]`. `x == 1.0` reads the first sample again
    /// (periodic table) rather than past the end.
    #[inline]
    pub fn get(&self, x: f32) -> f32 {
        debug_assert!((0.0..=1.0).contains(&x), "WaveTable::get expects x in [0, 1], got {x}");
        self.index(x * TABLE_SIZE as f32)
    }
}
