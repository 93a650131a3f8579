//! Generic DSP utilities and math helpers.
//!
//! Design goals:
//! - `no_std` ready (guarded by the crate feature `no-std`)
//! - Math backend selection that works in both `std` and `no_std` contexts
//! - Optional `fast-math` approximations for table generation
//! - Clean, side-effect free helpers that are easy to test
//!
//! Features used by this file:
//! - `fast-math` : enables the polynomial sine
//! - `simd`      : enables the `wide` peak scan used by the limiter
//!
//! Conventions:
//! - All functions are `#[inline]` where useful to help the optimizer.
//! - Argument and return domains are documented per function.

#![allow(clippy::excessive_precision)]

use core::f32::consts::PI;

use cfg_if::cfg_if;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    // micromath preferred if explicitly requested (works in no_std)
    if #[cfg(feature = "micromath")] {
        use micromath::F32Ext as _;
        #[inline] pub(crate) fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] pub(crate) fn m_cos(x: f32) -> f32 { x.cos() }
        #[inline] pub(crate) fn m_tan(x: f32) -> f32 { x.tan() }
        #[inline] pub(crate) fn m_atan(x: f32) -> f32 { x.atan() }
        #[inline] pub(crate) fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] pub(crate) fn m_ln(x: f32) -> f32 { x.ln() }
        #[inline] pub(crate) fn m_floor(x: f32) -> f32 { x.floor() }
        #[inline] pub(crate) fn m_ceil(x: f32) -> f32 { x.ceil() }
        #[inline] pub(crate) fn m_abs(x: f32) -> f32 { x.abs() }
    // libm (C math) in no_std
    } else if #[cfg(feature = "no-std")] {
        #[inline] pub(crate) fn m_sin(x: f32) -> f32 { libm::sinf(x) }
        #[inline] pub(crate) fn m_cos(x: f32) -> f32 { libm::cosf(x) }
        #[inline] pub(crate) fn m_tan(x: f32) -> f32 { libm::tanf(x) }
        #[inline] pub(crate) fn m_atan(x: f32) -> f32 { libm::atanf(x) }
        #[inline] pub(crate) fn m_exp(x: f32) -> f32 { libm::expf(x) }
        #[inline] pub(crate) fn m_ln(x: f32) -> f32 { libm::logf(x) }
        #[inline] pub(crate) fn m_floor(x: f32) -> f32 { libm::floorf(x) }
        #[inline] pub(crate) fn m_ceil(x: f32) -> f32 { libm::ceilf(x) }
        #[inline] pub(crate) fn m_abs(x: f32) -> f32 { libm::fabsf(x) }
    // std backend
    } else {
        #[inline] pub(crate) fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] pub(crate) fn m_cos(x: f32) -> f32 { x.cos() }
        #[inline] pub(crate) fn m_tan(x: f32) -> f32 { x.tan() }
        #[inline] pub(crate) fn m_atan(x: f32) -> f32 { x.atan() }
        #[inline] pub(crate) fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] pub(crate) fn m_ln(x: f32) -> f32 { x.ln() }
        #[inline] pub(crate) fn m_floor(x: f32) -> f32 { x.floor() }
        #[inline] pub(crate) fn m_ceil(x: f32) -> f32 { x.ceil() }
        #[inline] pub(crate) fn m_abs(x: f32) -> f32 { x.abs() }
    }
}

// --------------------------------- Constants -------------------------------------

/// 2π (commonly useful)
pub const TAU: f32 = 2.0 * PI;

/// A very small epsilon used in denormal handling and safe divisions.
pub const EPS_SMALL: f32 = 1.0e-20;

/// Levels below this are treated as silence by detectors.
pub const SILENCE: f32 = 1.0e-6;

// --------------------------------- Utilities -------------------------------------

#[inline]
pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    if x < lo { lo } else if x > hi { hi } else { x }
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Wrap phase into [0, 1).
///
/// Unlike `x % 1.0` this never returns a negative value, and a tiny negative input
/// that would round to exactly 1.0 is folded to 0.0.
#[inline]
pub fn wrap01(p: f32) -> f32 {
    let w = p - m_floor(p);
    if w >= 1.0 { 0.0 } else { w }
}

/// Kill denormal/subnormal values. Returns 0.0 if |x| < EPS_SMALL.
#[inline]
pub fn kill_denormals(x: f32) -> f32 {
    if m_abs(x) < EPS_SMALL { 0.0 } else { x }
}

/// NaN and ±inf become 0.0; finite values pass through.
#[inline]
pub fn finite_or_zero(x: f32) -> f32 {
    if x.is_finite() { x } else { 0.0 }
}

// --------------------------------- dB / linear -----------------------------------

/// Convert dB to linear gain: lin = 10^(db/20).
#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    if db <= -120.0 { 0.0 } else { m_exp(0.11512925464970229_f32 * db) } // ln(10)/20 ≈ 0.115129...
}

/// Convert linear gain to dB: db = 20*log10(lin).
#[inline]
pub fn lin_to_db(lin: f32) -> f32 {
    if lin <= EPS_SMALL { -120.0 }
    else { 8.685889638065036553_f32 * m_ln(lin) } // 20/ln(10)
}

// --------------------------------- Fast trig -------------------------------------

/// Fast sine with range reduction into [-π, π] and 5th-order minimax-style poly.
/// Max abs error ~1e-3 for musical uses when `fast-math` is enabled; falls back to exact otherwise.
#[inline]
pub fn fast_sin(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let k = m_floor(x / TAU + 0.5);
            let xr = x - k * TAU;

            // 5th-order odd polynomial: sin(x) ≈ x * (a + b x^2 + c x^4)
            let x2 = xr * xr;
            xr * (0.999_979_313_3 + x2 * (-0.166_624_432_0 + x2 * 0.008_308_978_98))
        } else {
            m_sin(x)
        }
    }
}

// --------------------------------- Exponentials / smoothing ----------------------

/// One-pole coefficient for a time constant `t_ms` (milliseconds).
///
/// The discrete form used by the detectors is `y = target + a * (y - target)`
/// with `a = exp(-1/(tau * sr))`. A non-positive time means "instant" (`a = 0`).
#[inline]
pub fn one_pole_coeff_ms(t_ms: f32, sr: f32) -> f32 {
    if t_ms <= 0.0 { return 0.0; }
    let tau = t_ms * 0.001;
    m_exp(-1.0 / (tau * sr))
}

// --------------------------------- Peak scan -------------------------------------

/// Largest absolute value in `buf` (0.0 for an empty slice).
#[inline]
pub fn peak_abs(buf: &[f32]) -> f32 {
    cfg_if! {
        if #[cfg(feature = "simd")] {
            use wide::f32x8;

            let chunks = buf.chunks_exact(8);
            let tail = chunks.remainder();
            let mut acc = f32x8::splat(0.0);
            for c in chunks {
                let lane: [f32; 8] = [c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]];
                acc = acc.max(f32x8::from(lane).abs());
            }
            let head = acc.to_array().iter().fold(0.0_f32, |m, &x| m.max(x));
            tail.iter().fold(head, |m, &x| m.max(m_abs(x)))
        } else {
            buf.iter().fold(0.0_f32, |m, &x| m.max(m_abs(x)))
        }
    }
}

// --------------------------------- Tests (std only) ------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_lin_roundtrip() {
        for db in [-60.0, -20.0, -6.0, 0.0, 6.0, 12.0] {
            let back = lin_to_db(db_to_lin(db));
            assert!((db - back).abs() < 0.1, "db={}, back={}", db, back);
        }
    }

    #[test]
    fn wrap01_stays_in_unit_interval() {
        for x in [-2.25, -1.0, -1.0e-9, 0.0, 0.5, 0.999_999, 1.0, 3.75] {
            let w = wrap01(x);
            assert!((0.0..1.0).contains(&w), "x={x} w={w}");
        }
        assert!((wrap01(1.25) - 0.25).abs() < 1e-6);
        assert!((wrap01(-0.25) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn instant_time_constant_is_zero_coeff() {
        assert_eq!(one_pole_coeff_ms(0.0, 48_000.0), 0.0);
        let a = one_pole_coeff_ms(50.0, 48_000.0);
        assert!(a > 0.99 && a < 1.0);
    }

    #[test]
    fn peak_abs_finds_negative_peaks() {
        let mut buf = [0.1_f32; 21];
        buf[13] = -3.5;
        assert_eq!(peak_abs(&buf), 3.5);
        assert_eq!(peak_abs(&[]), 0.0);
    }

    #[test]
    fn non_finite_values_are_zeroed() {
        assert_eq!(finite_or_zero(f32::NAN), 0.0);
        assert_eq!(finite_or_zero(f32::INFINITY), 0.0);
        assert_eq!(finite_or_zero(f32::NEG_INFINITY), 0.0);
        assert_eq!(finite_or_zero(-2.5), -2.5);
        assert_eq!(kill_denormals(1.0e-30), 0.0);
        assert_eq!(kill_denormals(1.0e-3), 1.0e-3);
    }

    #[test]
    fn clamp_respects_upper_bound() {
        assert_eq!(clamp(2.0, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-2.0, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.3, -1.0, 1.0), 0.3);
    }
}
