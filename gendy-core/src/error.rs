//! Construction-time errors.
//!
//! Nothing on the per-sample path returns an error; these only surface from
//! `init`/constructor calls that size buffers or validate settings.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum DspError {
    #[error("sample rate must be finite and positive, got {0}")]
    InvalidSampleRate(f32),

    #[error("invalid limiter setting `{field}`: {value}")]
    InvalidLimiterSetting { field: &'static str, value: f32 },

    #[error("buffer capacity must be at least {min} samples, got {got}")]
    InvalidCapacity { min: usize, got: usize },
}

pub type Result<T> = core::result::Result<T, DspError>;
