//! Oscillator ensemble: plays up to four stochastic oscillators one after another.
//!
//! The active voice runs for `stutters[i]` cycles (counted on its `last_flag`), then the
//! ensemble crossfades from the outgoing voice's last sample to the incoming voice's first
//! sample over one segment of the outgoing voice, and hands over.
//!
//! States
//! - Playing  : drive voice `active`, pass its output through
//! - Swapping : output = lerp(amp, amp_next, phase); voices are not advanced
//!
//! Only the active voice advances; idle voices keep their state until their turn.

use gendy_core::dsp::lerp;
use tracing::debug;

use crate::oscillator::{GendyParams, StochasticOscillator};

pub const MAX_VOICES: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EnsembleParams {
    /// Voices in rotation, clamped to `[1, MAX_VOICES]`.
    pub active_voices: usize,
    /// Cycles each voice plays before handing over; 0 is treated as 1.
    pub stutters: [u32; MAX_VOICES],
}

impl Default for EnsembleParams {
    fn default() -> Self {
        Self { active_voices: MAX_VOICES, stutters: [1; MAX_VOICES] }
    }
}

#[derive(Clone, Debug)]
pub struct OscillatorEnsemble {
    voices: [StochasticOscillator; MAX_VOICES],
    params: EnsembleParams,
    active: usize,
    laps_left: u32,

    swapping: bool,
    phase: f32,
    speed: f32,
    amp: f32,
    amp_next: f32,

    out: f32,
}

impl Default for OscillatorEnsemble {
    fn default() -> Self {
        Self::new(EnsembleParams::default(), GendyParams::default())
    }
}

impl OscillatorEnsemble {
    /// Every voice starts from `voice`, each seeded from entropy.
    pub fn new(params: EnsembleParams, voice: GendyParams) -> Self {
        Self::from_voices(params, core::array::from_fn(|_| StochasticOscillator::new(voice)))
    }

    /// Deterministic ensemble; voice `i` is seeded with `seed + i`.
    pub fn with_seed(params: EnsembleParams, voice: GendyParams, seed: u64) -> Self {
        Self::from_voices(
            params,
            core::array::from_fn(|i| StochasticOscillator::with_seed(voice, seed.wrapping_add(i as u64))),
        )
    }

    fn from_voices(params: EnsembleParams, voices: [StochasticOscillator; MAX_VOICES]) -> Self {
        let mut s = Self {
            voices,
            params,
            active: 0,
            laps_left: 1,
            swapping: false,
            phase: 0.0,
            speed: 0.0,
            amp: 0.0,
            amp_next: 0.0,
            out: 0.0,
        };
        s.laps_left = s.stutter(0);
        s
    }

    #[inline] pub fn out(&self) -> f32 { self.out }
    #[inline] pub fn active_index(&self) -> usize { self.active }
    #[inline] pub fn is_swapping(&self) -> bool { self.swapping }
    #[inline] pub fn params(&self) -> &EnsembleParams { &self.params }

    #[inline] pub fn voice(&self, i: usize) -> &StochasticOscillator { &self.voices[i] }
    #[inline] pub fn voice_mut(&mut self, i: usize) -> &mut StochasticOscillator { &mut self.voices[i] }

    #[inline]
    pub fn set_voice_params(&mut self, i: usize, p: GendyParams) {
        self.voices[i].set_params(p);
    }

    /// Apply the same parameters to every voice.
    pub fn fan_out(&mut self, p: GendyParams) {
        for v in &mut self.voices {
            v.set_params(p);
        }
    }

    pub fn set_params(&mut self, p: EnsembleParams) {
        if p.active_voices != self.params.active_voices {
            debug!(from = self.params.active_voices, to = p.active_voices, "ensemble voice count changed");
        }
        self.params = p;
    }

    #[inline]
    fn active_voices(&self) -> usize {
        self.params.active_voices.clamp(1, MAX_VOICES)
    }

    #[inline]
    fn stutter(&self, i: usize) -> u32 {
        self.params.stutters[i].max(1)
    }

    /// Advance one sample of duration `dt` seconds.
    #[inline]
    pub fn process(&mut self, dt: f32) {
        let n = self.active_voices();
        if self.active >= n {
            self.active %= n;
        }

        if self.swapping {
            self.out = lerp(self.amp, self.amp_next, self.phase);
            self.phase += self.speed;
            if self.phase >= 1.0 {
                self.swapping = false;
            }
            return;
        }

        let voice = &mut self.voices[self.active];
        voice.process(dt);
        self.out = voice.out();

        if !voice.last_flag() {
            return;
        }
        self.laps_left = self.laps_left.saturating_sub(1);
        if self.laps_left > 0 {
            return;
        }

        self.amp = self.out;
        self.speed = voice.speed(dt);
        self.active = (self.active + 1) % n;

        let incoming = &mut self.voices[self.active];
        incoming.process(dt);
        self.amp_next = incoming.out();

        self.laps_left = self.stutter(self.active);
        self.phase = 0.0;
        // a stalled outgoing voice would never finish the window
        self.swapping = self.speed > 0.0;
    }
}
