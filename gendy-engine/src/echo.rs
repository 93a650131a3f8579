//! Stochastic echo: a breakpoint random walk applied to a captured sample loop.
//!
//! A gate starts capturing the input into a buffer. The buffer is then played back as a
//! loop, and every sample the walker adds an enveloped breakpoint amplitude into it, so
//! the loop mutates a little more on every pass. Breakpoints are spaced a fixed number
//! of samples apart and each one's duration stretches or shrinks that spacing.
//!
//! Notes:
//! - Buffers are allocated once, at construction.
//! - Capture stops [`LOOP_FADE`] samples short of capacity and fills the tail with a
//!   linear fade back to the first sample, so the loop closes without a click.
//! - Samples are kept on a ±5 rail by a single wrap pass.

use gendy_core::bounds::{wrap, BoundPolicy};
use gendy_core::distribution::Distribution;
use gendy_core::dsp::{lerp, wrap01};
use gendy_core::error::{DspError, Result};
use gendy_core::wavetable::{Shape, WaveTable};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Default capture capacity in samples (one second at 44.1 kHz).
pub const ECHO_CAPACITY: usize = 44_100;
pub const ECHO_MAX_BPTS: usize = 4096;
/// Length of the loop-closing fade.
pub const LOOP_FADE: usize = 50;

const RAIL: f32 = 5.0;
const MIN_DUR: f32 = 0.01;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EchoParams {
    /// Fraction of the capacity that loops, clamped to [0.1, 1].
    pub length: f32,
    /// Samples between breakpoints (≥ 1).
    pub spacing: usize,
    pub max_amp_step: f32,
    pub max_dur_step: f32,
    pub envelope: Shape,
    pub policy: BoundPolicy,
    pub distribution: Distribution,
    /// Amplitudes keep walking from their last value instead of restarting at 0.
    pub accumulate: bool,
}

impl Default for EchoParams {
    fn default() -> Self {
        Self {
            length: 1.0,
            spacing: 1_500,
            max_amp_step: 0.05,
            max_dur_step: 0.05,
            envelope: Shape::Triangle,
            policy: BoundPolicy::Wrap,
            distribution: Distribution::Linear,
            accumulate: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StochasticEcho {
    params: EchoParams,
    buffer: Vec<f32>,
    pristine: Vec<f32>,
    amps: Vec<f32>,
    durs: Vec<f32>,
    env: WaveTable,
    rng: SmallRng,

    capturing: bool,
    cap_pos: usize,

    idx: usize,
    index: usize,
    phase: f32,
    amp: f32,
    amp_next: f32,
    g_idx: f32,
    g_idx_next: f32,

    out: f32,
}

impl Default for StochasticEcho {
    fn default() -> Self {
        Self::new(EchoParams::default())
    }
}

impl StochasticEcho {
    /// Echo with the default capacity, seeded from OS entropy.
    pub fn new(params: EchoParams) -> Self {
        Self::build(params, ECHO_CAPACITY, SmallRng::from_entropy())
    }

    pub fn with_capacity(params: EchoParams, capacity: usize) -> Result<Self> {
        check_capacity(capacity)?;
        Ok(Self::build(params, capacity, SmallRng::from_entropy()))
    }

    /// Deterministic echo; equal seeds and input give equal output.
    pub fn with_seed(params: EchoParams, capacity: usize, seed: u64) -> Result<Self> {
        check_capacity(capacity)?;
        Ok(Self::build(params, capacity, SmallRng::seed_from_u64(seed)))
    }

    fn build(params: EchoParams, capacity: usize, rng: SmallRng) -> Self {
        Self {
            params,
            buffer: vec![0.0; capacity],
            pristine: vec![0.0; capacity],
            amps: vec![0.0; ECHO_MAX_BPTS],
            durs: vec![1.0; ECHO_MAX_BPTS],
            env: WaveTable::new(params.envelope),
            rng,
            capturing: false,
            cap_pos: 0,
            idx: 0,
            index: 0,
            phase: 1.0,
            amp: 0.0,
            amp_next: 0.0,
            g_idx: 0.0,
            g_idx_next: 0.5,
            out: 0.0,
        }
    }

    #[inline] pub fn out(&self) -> f32 { self.out }
    #[inline] pub fn capacity(&self) -> usize { self.buffer.len() }
    #[inline] pub fn buffer(&self) -> &[f32] { &self.buffer }
    #[inline] pub fn pristine(&self) -> &[f32] { &self.pristine }
    #[inline] pub fn is_capturing(&self) -> bool { self.capturing }
    #[inline] pub fn params(&self) -> &EchoParams { &self.params }
    #[inline] pub fn params_mut(&mut self) -> &mut EchoParams { &mut self.params }
    #[inline] pub fn set_params(&mut self, p: EchoParams) { self.params = p; }

    /// Looping length in samples.
    #[inline]
    pub fn loop_len(&self) -> usize {
        let frac = self.params.length.clamp(0.1, 1.0);
        ((frac * self.capacity() as f32) as usize).clamp(1, self.capacity())
    }

    #[inline]
    fn spacing(&self) -> usize {
        self.params.spacing.max(1)
    }

    /// Breakpoints across the loop: `loop_len / spacing + 1`, capped at [`ECHO_MAX_BPTS`].
    #[inline]
    pub fn num_bpts(&self) -> usize {
        (self.loop_len() / self.spacing() + 1).min(ECHO_MAX_BPTS)
    }

    fn reset_breakpoints(&mut self) {
        self.amps.fill(0.0);
        self.durs.fill(1.0);
    }

    /// Start capturing the input from the top of the buffer.
    pub fn gate(&mut self) {
        self.reset_breakpoints();
        self.capturing = true;
        self.cap_pos = 0;
        self.idx = 0;
        debug!(capacity = self.capacity(), "echo capture started");
    }

    /// Throw away the walk and go back to the captured loop.
    pub fn restore(&mut self) {
        self.buffer.copy_from_slice(&self.pristine);
        self.reset_breakpoints();
    }

    #[inline]
    fn draw(&mut self) -> f32 {
        let r: f32 = self.rng.gen_range(-1.0..=1.0);
        self.params.distribution.sample(r)
    }

    fn capture(&mut self, x: f32) {
        let cap = self.capacity();
        if self.cap_pos + LOOP_FADE < cap {
            self.buffer[self.cap_pos] = x;
            self.pristine[self.cap_pos] = x;
            self.cap_pos += 1;
            return;
        }

        // fade between captured input, not the walked copy
        let from = if self.cap_pos > 0 { self.pristine[self.cap_pos - 1] } else { 0.0 };
        let to = self.pristine[0];
        let step = 1.0 / LOOP_FADE as f32;
        for (k, i) in (self.cap_pos..cap).enumerate() {
            let y = lerp(from, to, k as f32 * step);
            self.buffer[i] = y;
            self.pristine[i] = y;
        }
        self.capturing = false;
        debug!(samples = self.cap_pos, "echo capture finished");
    }

    fn step_breakpoint(&mut self, n: usize) {
        self.amp = self.amp_next;
        self.index = (self.index + 1) % n;
        let i = self.index;

        let a = self.params.max_amp_step * self.draw();
        let d = self.params.max_dur_step * self.draw();
        let base = if self.params.accumulate { self.amps[i] } else { 0.0 };
        let policy = self.params.policy;
        self.amps[i] = policy.apply(base + a, -1.0, 1.0);
        self.durs[i] = policy.apply(self.durs[i] + d, 0.5, 1.5);

        self.amp_next = self.amps[i];
        self.g_idx = self.g_idx_next;
        self.g_idx_next = 0.0;
    }

    /// Feed one input sample (only stored while capturing) and return the loop output.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        if self.capturing {
            self.capture(input);
        }
        self.env.switch_shape(self.params.envelope);

        let len = self.loop_len();
        let n = self.num_bpts();
        let spacing = self.spacing() as f32;
        if self.index >= n {
            self.index %= n;
        }
        if self.idx >= len {
            self.idx %= len;
        }

        let mut laps = 0;
        while self.phase >= 1.0 && laps < n {
            self.phase -= 1.0;
            self.step_breakpoint(n);
            laps += 1;
        }
        self.phase = wrap01(self.phase);

        let y = wrap(self.buffer[self.idx] + self.amp * self.env.get(self.g_idx), -RAIL, RAIL);
        self.buffer[self.idx] = y;
        self.out = y;

        self.idx = (self.idx + 1) % len;
        let g_step = 1.0 / (2.0 * spacing);
        self.g_idx = wrap01(self.g_idx + g_step);
        self.g_idx_next = wrap01(self.g_idx_next + g_step);

        self.phase += 1.0 / (self.durs[self.index].max(MIN_DUR) * spacing);
        y
    }
}

#[inline]
fn check_capacity(capacity: usize) -> Result<()> {
    let min = LOOP_FADE + 1;
    if capacity < min {
        return Err(DspError::InvalidCapacity { min, got: capacity });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gendy_core::dsp::TAU;

    const CAP: usize = 4_410;
    const SR: f32 = 44_100.0;

    fn tone(n: usize) -> f32 {
        (TAU * 220.0 * n as f32 / SR).sin()
    }

    fn echo(params: EchoParams) -> StochasticEcho {
        StochasticEcho::with_seed(params, CAP, 17).unwrap()
    }

    fn capture(e: &mut StochasticEcho) -> usize {
        e.gate();
        let mut n = 0;
        while e.is_capturing() {
            e.process(tone(n));
            n += 1;
        }
        n
    }

    #[test]
    fn gate_captures_input_and_closes_the_loop() {
        let mut e = echo(EchoParams { spacing: 100, ..EchoParams::default() });
        let fed = capture(&mut e);
        assert_eq!(fed, CAP - LOOP_FADE + 1);

        let p = e.pristine();
        for (n, &x) in p.iter().enumerate().take(CAP - LOOP_FADE) {
            assert_eq!(x, tone(n), "n={n}");
        }
        // fade runs from the last captured sample toward the first one
        assert_eq!(p[CAP - LOOP_FADE], p[CAP - LOOP_FADE - 1]);
        let last = p[CAP - 1];
        let target = lerp(p[CAP - LOOP_FADE - 1], p[0], (LOOP_FADE - 1) as f32 / LOOP_FADE as f32);
        assert!((last - target).abs() < 1e-5);
    }

    #[test]
    fn restore_returns_the_pristine_capture() {
        let params = EchoParams { spacing: 50, max_amp_step: 0.3, accumulate: true, ..EchoParams::default() };
        let mut e = echo(params);
        capture(&mut e);
        for _ in 0..3 * CAP {
            e.process(0.0);
        }
        assert_ne!(e.buffer(), e.pristine());
        e.restore();
        assert_eq!(e.buffer(), e.pristine());
    }

    #[test]
    fn output_stays_on_the_rail() {
        let params = EchoParams {
            spacing: 10,
            max_amp_step: 0.3,
            max_dur_step: 0.3,
            accumulate: true,
            distribution: Distribution::Cauchy,
            policy: BoundPolicy::Mirror,
            ..EchoParams::default()
        };
        let mut e = echo(params);
        e.gate();
        for n in 0..10 * CAP {
            // loud input is folded onto the rail as well
            let y = e.process(8.0 * tone(n));
            assert!(y.is_finite());
            assert!((-RAIL..=RAIL).contains(&y), "n={n} y={y}");
        }
    }

    #[test]
    fn breakpoint_count_follows_length_and_spacing() {
        let mut e = echo(EchoParams { spacing: 441, ..EchoParams::default() });
        assert_eq!(e.loop_len(), CAP);
        assert_eq!(e.num_bpts(), 11);
        e.params_mut().length = 0.5;
        assert_eq!(e.loop_len(), CAP / 2);
        e.params_mut().length = 0.0;
        assert_eq!(e.loop_len(), 441);
        e.params_mut().spacing = 0;
        assert_eq!(e.num_bpts(), ECHO_MAX_BPTS.min(441 + 1));
    }

    #[test]
    fn shrinking_the_loop_keeps_positions_valid() {
        let mut e = echo(EchoParams { spacing: 20, ..EchoParams::default() });
        capture(&mut e);
        for _ in 0..CAP / 2 {
            e.process(0.0);
        }
        e.params_mut().length = 0.1;
        e.params_mut().spacing = 200;
        for _ in 0..CAP {
            assert!(e.process(0.0).is_finite());
        }
    }

    #[test]
    fn silent_loop_without_capture_stays_small() {
        // non-accumulating amplitudes restart from 0 on every visit
        let mut e = echo(EchoParams { spacing: 100, ..EchoParams::default() });
        for _ in 0..CAP {
            assert!(e.process(0.0).abs() <= RAIL);
        }
    }

    #[test]
    fn tiny_capacity_is_rejected() {
        let err = StochasticEcho::with_capacity(EchoParams::default(), 10).unwrap_err();
        assert_eq!(err, DspError::InvalidCapacity { min: LOOP_FADE + 1, got: 10 });
        assert!(StochasticEcho::with_capacity(EchoParams::default(), LOOP_FADE + 1).is_ok());
    }
}
