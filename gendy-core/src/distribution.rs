//! Step-size distributions for breakpoint random walks.
//!
//! The inverse-transform shapes follow the classic GENDY family: a uniform draw
//! `r ∈ [-1, 1]` is reshaped so that most steps are small (Cauchy), pushed toward the
//! extremes (Arcsine), or left alone (Linear).

use crate::dsp::{m_atan, m_sin, m_tan};
use core::f32::consts::PI;

/// Spread parameter shared by the Cauchy and Arcsine shapes.
const SPREAD: f32 = 0.5;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Distribution {
    #[default]
    Linear,
    Cauchy,
    Arcsine,
}

impl Distribution {
    /// Selector index as exposed on a three-way switch (0, 1, 2).
    #[inline]
    pub fn from_index(i: u32) -> Option<Self> {
        match i {
            0 => Some(Self::Linear),
            1 => Some(Self::Cauchy),
            2 => Some(Self::Arcsine),
            _ => None,
        }
    }

    /// Reshape a uniform draw `r ∈ [-1, 1]` into a step magnitude.
    #[inline]
    pub fn sample(self, r: f32) -> f32 {
        match self {
            Self::Linear => r,
            Self::Cauchy => {
                let c = m_atan(10.0 * SPREAD);
                (1.0 / SPREAD) * m_tan(c * (2.0 * r - 1.0)) * 0.1
            }
            Self::Arcsine => {
                let c = m_sin(0.5 * PI * SPREAD);
                m_sin(PI * (r - 0.5) * SPREAD) / c
            }
        }
    }
}

/// Sample by raw selector; unknown selectors return `r` unchanged.
#[inline]
pub fn sample_indexed(selector: u32, r: f32) -> f32 {
    Distribution::from_index(selector).map_or(r, |d| d.sample(r))
}
