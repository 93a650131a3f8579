//! Voices that implement the realtime [`Generator`](crate::graph::Generator) trait.
//!
//! A voice is the per-sample glue between a stochastic source and the lookahead
//! limiter: source → scale onto the ±5 output rail → limiter. Voices are **mono**
//! and allocation-free per sample; only `reset` (limiter re-init) allocates.
//!
//! - `GrandyVoice`   : a single [`StochasticOscillator`]
//! - `StitcherVoice` : an [`OscillatorEnsemble`]

use gendy_core::error::Result;
use gendy_core::limiter::LookaheadLimiter;
use tracing::{debug, warn};

use crate::ensemble::OscillatorEnsemble;
use crate::graph::Generator;
use crate::oscillator::StochasticOscillator;

/// Raw oscillator output is scaled by this before limiting.
pub const OUTPUT_SCALE: f32 = 5.0;

/// Re-initialize `limiter` for `sr`; returns the new sample period on success.
fn reset_limiter(limiter: &mut LookaheadLimiter, sr: f32, voice: &'static str) -> Option<f32> {
    match limiter.init(sr) {
        Ok(()) => {
            debug!(voice, sr, lookahead = limiter.lookahead_len(), "voice reset");
            Some(1.0 / sr)
        }
        Err(err) => {
            warn!(voice, %err, "limiter re-init failed, keeping previous sample rate");
            None
        }
    }
}

#[derive(Clone, Debug)]
pub struct GrandyVoice {
    osc: StochasticOscillator,
    limiter: LookaheadLimiter,
    dt: f32,
}

impl GrandyVoice {
    pub fn new(osc: StochasticOscillator, sr: f32) -> Result<Self> {
        let limiter = LookaheadLimiter::new(sr)?;
        Ok(Self { osc, limiter, dt: 1.0 / sr })
    }

    #[inline] pub fn oscillator(&self) -> &StochasticOscillator { &self.osc }
    #[inline] pub fn oscillator_mut(&mut self) -> &mut StochasticOscillator { &mut self.osc }
    #[inline] pub fn limiter(&self) -> &LookaheadLimiter { &self.limiter }
}

impl Generator for GrandyVoice {
    fn reset(&mut self, sr: f32) {
        if let Some(dt) = reset_limiter(&mut self.limiter, sr, "grandy") {
            self.dt = dt;
        }
    }

    #[inline]
    fn next(&mut self) -> f32 {
        self.osc.process(self.dt);
        self.limiter.process(OUTPUT_SCALE * self.osc.out())
    }
}

#[derive(Clone, Debug)]
pub struct StitcherVoice {
    ensemble: OscillatorEnsemble,
    limiter: LookaheadLimiter,
    dt: f32,
}

impl StitcherVoice {
    pub fn new(ensemble: OscillatorEnsemble, sr: f32) -> Result<Self> {
        let limiter = LookaheadLimiter::new(sr)?;
        Ok(Self { ensemble, limiter, dt: 1.0 / sr })
    }

    #[inline] pub fn ensemble(&self) -> &OscillatorEnsemble { &self.ensemble }
    #[inline] pub fn ensemble_mut(&mut self) -> &mut OscillatorEnsemble { &mut self.ensemble }
    #[inline] pub fn limiter(&self) -> &LookaheadLimiter { &self.limiter }
}

impl Generator for StitcherVoice {
    fn reset(&mut self, sr: f32) {
        if let Some(dt) = reset_limiter(&mut self.limiter, sr, "stitcher") {
            self.dt = dt;
        }
    }

    #[inline]
    fn next(&mut self) -> f32 {
        self.ensemble.process(self.dt);
        self.limiter.process(OUTPUT_SCALE * self.ensemble.out())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::EnsembleParams;
    use crate::graph::Engine;
    use crate::oscillator::GendyParams;

    const SR: f32 = 48_000.0;

    #[test]
    fn grandy_voice_respects_the_ceiling() {
        let p = GendyParams { max_amp_step: 0.3, ..GendyParams::default() };
        let voice = GrandyVoice::new(StochasticOscillator::with_seed(p, 1), SR).unwrap();
        let mut engine = Engine::new(voice, SR);
        let ceiling = engine.generator().limiter().config().ceiling;
        for _ in 0..SR as usize {
            let y = engine.next(SR);
            assert!(y.is_finite());
            assert!(y.abs() <= ceiling);
        }
    }

    #[test]
    fn stitcher_voice_respects_the_ceiling() {
        let e = OscillatorEnsemble::with_seed(EnsembleParams::default(), GendyParams::default(), 2);
        let voice = StitcherVoice::new(e, SR).unwrap();
        let mut engine = Engine::new(voice, SR);
        let mut block = vec![0.0; 24_000];
        engine.render(&mut block);
        assert!(block.iter().all(|y| y.is_finite() && y.abs() <= 4.75));
    }

    #[test]
    fn reset_resizes_the_limiter() {
        let voice = GrandyVoice::new(StochasticOscillator::with_seed(GendyParams::default(), 3), SR).unwrap();
        let mut engine = Engine::new(voice, SR);
        assert_eq!(engine.generator().limiter().lookahead_len(), 240);
        engine.next(96_000.0);
        assert_eq!(engine.generator().limiter().lookahead_len(), 480);
    }

    #[test]
    fn bad_rate_keeps_previous_state() {
        let mut voice = GrandyVoice::new(StochasticOscillator::with_seed(GendyParams::default(), 4), SR).unwrap();
        voice.reset(0.0);
        assert_eq!(voice.limiter().sample_rate(), SR);
        assert!(voice.next().is_finite());
        assert!(GrandyVoice::new(StochasticOscillator::default(), -1.0).is_err());
    }
}
