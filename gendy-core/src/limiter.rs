//! Lookahead peak limiter with soft/hard knee and automatic makeup gain.
//!
//! Signal path (one call per sample, strictly in order):
//! 1. write the input into a circular delay line
//! 2. scan the whole delay line for its peak (the "future" window)
//! 3. follow that peak with a fast envelope (instant rise, 1 ms fall)
//! 4. gain target = min(soft knee around threshold, hard clamp at ceiling), floored
//! 5. smooth the gain with attack (deepening) / release (relaxing) coefficients
//! 6. emit the oldest sample of the delay line with that gain applied
//! 7. track a slow peak history for makeup gain (capped at ~+6 dB)
//! 8. hard clip at the ceiling as a last resort
//!
//! Levels are in the caller's units; the defaults assume a ±5 rail, so the
//! threshold is 4.5 and the ceiling 4.75.
//!
//! `init` is the only allocating call and belongs off the audio thread.

use alloc::vec;
use alloc::vec::Vec;

use crate::dsp::{
    clamp, db_to_lin, finite_or_zero, kill_denormals, lin_to_db, m_abs, m_ceil, one_pole_coeff_ms, peak_abs,
    SILENCE,
};
use crate::error::{DspError, Result};

/// Limiter settings. Times are in milliseconds, levels in signal units.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LimiterConfig {
    pub threshold: f32,
    pub ceiling: f32,
    pub knee_width_db: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub lookahead_ms: f32,
    pub detector_ms: f32,
    /// Smallest gain the limiter will apply (never fully mutes).
    pub min_gain: f32,
    /// Makeup gain aims to bring the peak history to `threshold * makeup_ratio`.
    pub makeup_ratio: f32,
    pub max_makeup: f32,
    /// Per-sample pole of the peak history tracker.
    pub history_pole: f32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            threshold: 4.5,
            ceiling: 4.75,
            knee_width_db: 0.5,
            attack_ms: 0.1,
            release_ms: 50.0,
            lookahead_ms: 5.0,
            detector_ms: 1.0,
            min_gain: 0.01,
            makeup_ratio: 0.8,
            max_makeup: 2.0,
            history_pole: 0.9999,
        }
    }
}

impl LimiterConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("threshold", self.threshold),
            ("ceiling", self.ceiling),
            ("min_gain", self.min_gain),
            ("max_makeup", self.max_makeup),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(DspError::InvalidLimiterSetting { field, value });
            }
        }
        let non_negative = [
            ("knee_width_db", self.knee_width_db),
            ("attack_ms", self.attack_ms),
            ("release_ms", self.release_ms),
            ("lookahead_ms", self.lookahead_ms),
            ("detector_ms", self.detector_ms),
            ("makeup_ratio", self.makeup_ratio),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(DspError::InvalidLimiterSetting { field, value });
            }
        }
        if self.ceiling < self.threshold {
            return Err(DspError::InvalidLimiterSetting { field: "ceiling", value: self.ceiling });
        }
        if self.min_gain > 1.0 {
            return Err(DspError::InvalidLimiterSetting { field: "min_gain", value: self.min_gain });
        }
        if !(0.0..1.0).contains(&self.history_pole) {
            return Err(DspError::InvalidLimiterSetting { field: "history_pole", value: self.history_pole });
        }
        Ok(())
    }

    /// Delay line length for `sr`: `ceil(lookahead · sr)`, at least one sample.
    #[inline]
    pub fn lookahead_samples(&self, sr: f32) -> usize {
        let n = m_ceil(self.lookahead_ms * sr / 1000.0);
        if n < 1.0 { 1 } else { n as usize }
    }
}

// ---------------------------------- Gain curves ----------------------------------

/// Quadratic soft knee: unity below the knee, flat at threshold above it.
#[inline]
fn soft_knee_db(input_db: f32, threshold_db: f32, knee_db: f32) -> f32 {
    let lower = threshold_db - knee_db / 2.0;
    if input_db < lower {
        input_db
    } else if input_db > threshold_db + knee_db / 2.0 {
        threshold_db
    } else {
        let delta = input_db - lower;
        input_db - delta * delta / (2.0 * knee_db)
    }
}

#[inline]
fn hard_knee_db(input_db: f32, ceiling_db: f32) -> f32 {
    input_db.min(ceiling_db)
}

// ---------------------------------- Limiter --------------------------------------

#[derive(Clone, Debug)]
pub struct LookaheadLimiter {
    cfg: LimiterConfig,
    sr: f32,

    delay: Vec<f32>,
    write: usize,

    // cached coefficients / dB levels
    attack_coeff: f32,
    release_coeff: f32,
    detector_coeff: f32,
    threshold_db: f32,
    ceiling_db: f32,

    // detector state
    envelope: f32,
    gain_reduction: f32,
    makeup_gain: f32,
    peak_history: f32,
}

impl Default for LookaheadLimiter {
    fn default() -> Self {
        Self::build(LimiterConfig::default(), 44_100.0)
    }
}

impl LookaheadLimiter {
    /// Default settings at sample rate `sr`.
    pub fn new(sr: f32) -> Result<Self> {
        Self::with_config(LimiterConfig::default(), sr)
    }

    pub fn with_config(cfg: LimiterConfig, sr: f32) -> Result<Self> {
        cfg.validate()?;
        check_sample_rate(sr)?;
        Ok(Self::build(cfg, sr))
    }

    fn build(cfg: LimiterConfig, sr: f32) -> Self {
        let mut s = Self {
            cfg,
            sr,
            delay: Vec::new(),
            write: 0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            detector_coeff: 0.0,
            threshold_db: lin_to_db(cfg.threshold),
            ceiling_db: lin_to_db(cfg.ceiling),
            envelope: 0.0,
            gain_reduction: 1.0,
            makeup_gain: 1.0,
            peak_history: 0.0,
        };
        s.resize(sr);
        s
    }

    /// Size the delay line for `sr`, derive coefficients and clear all state.
    pub fn init(&mut self, sr: f32) -> Result<()> {
        check_sample_rate(sr)?;
        self.resize(sr);
        Ok(())
    }

    fn resize(&mut self, sr: f32) {
        self.sr = sr;
        self.delay = vec![0.0; self.cfg.lookahead_samples(sr)];
        self.attack_coeff = one_pole_coeff_ms(self.cfg.attack_ms, sr);
        self.release_coeff = one_pole_coeff_ms(self.cfg.release_ms, sr);
        self.detector_coeff = one_pole_coeff_ms(self.cfg.detector_ms, sr);
        self.reset();
    }

    /// Zero the delay line and detector state; keeps the current size.
    pub fn reset(&mut self) {
        self.delay.fill(0.0);
        self.write = 0;
        self.envelope = 0.0;
        self.gain_reduction = 1.0;
        self.makeup_gain = 1.0;
        self.peak_history = 0.0;
    }

    #[inline] pub fn config(&self) -> &LimiterConfig { &self.cfg }
    #[inline] pub fn sample_rate(&self) -> f32 { self.sr }
    #[inline] pub fn lookahead_len(&self) -> usize { self.delay.len() }

    /// Current smoothed gain reduction, in (0, 1].
    #[inline] pub fn gain_reduction(&self) -> f32 { self.gain_reduction }

    /// Current automatic makeup gain (≥ 0).
    #[inline] pub fn makeup_gain(&self) -> f32 { self.makeup_gain }

    /// Linear gain that brings a detected `level` under the knee/ceiling curves.
    #[inline]
    fn target_gain(&self, level: f32) -> f32 {
        if level < SILENCE {
            return 1.0;
        }
        let level_db = lin_to_db(level);
        let soft = soft_knee_db(level_db, self.threshold_db, self.cfg.knee_width_db);
        let hard = hard_knee_db(level_db, self.ceiling_db);
        let reduction = db_to_lin(soft.min(hard) - level_db);
        reduction.max(self.cfg.min_gain)
    }

    #[inline]
    fn update_makeup(&mut self, level: f32) {
        self.peak_history = level.max(kill_denormals(self.peak_history * self.cfg.history_pole));
        self.makeup_gain = if self.peak_history > SILENCE {
            (self.cfg.threshold * self.cfg.makeup_ratio / self.peak_history).min(self.cfg.max_makeup)
        } else {
            1.0
        };
    }

    /// Process one sample. Output is delayed by the lookahead length.
    ///
    /// A non-finite input is stored as silence so it cannot latch the detectors.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let len = self.delay.len();
        self.delay[self.write] = finite_or_zero(x);

        let peak = peak_abs(&self.delay);
        self.envelope = if peak > self.envelope {
            peak
        } else {
            kill_denormals(peak + self.detector_coeff * (self.envelope - peak))
        };

        let target = self.target_gain(self.envelope);
        let coeff = if target < self.gain_reduction { self.attack_coeff } else { self.release_coeff };
        self.gain_reduction = target + coeff * (self.gain_reduction - target);

        let read = (self.write + 1) % len;
        let delayed = self.delay[read];

        self.update_makeup(m_abs(delayed * self.gain_reduction));

        let ceiling = self.cfg.ceiling;
        let y = clamp(delayed * self.gain_reduction * self.makeup_gain, -ceiling, ceiling);

        self.write = read;
        y
    }
}

#[inline]
fn check_sample_rate(sr: f32) -> Result<()> {
    if sr.is_finite() && sr > 0.0 { Ok(()) } else { Err(DspError::InvalidSampleRate(sr)) }
}
