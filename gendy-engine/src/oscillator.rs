//! Breakpoint-driven stochastic oscillator (dynamic stochastic synthesis).
//!
//! A ring of up to [`MAX_BPTS`] breakpoints describes one waveform cycle. Each time the
//! segment phase crosses 1.0 the oscillator steps to the next breakpoint and random-walks
//! it, so the waveform drifts a little every cycle. Between breakpoints the output is a
//! linear crossfade of two "grains": the breakpoint amplitude plus an enveloped source
//! (a sine table read at a drifting offset, or an FM carrier).
//!
//! Contents:
//! - `GendyParams`         : per-sample configuration snapshot (`Copy`)
//! - `Breakpoints`         : the four parallel breakpoint arrays
//! - `StochasticOscillator`: the generator itself
//!
//! Notes:
//! - `process(dt)` takes the sample period in seconds; the oscillator has no notion of
//!   sample rate beyond that.
//! - Current/next values are double buffered so the crossfade is continuous across a
//!   boundary.
//! - After every call `phase ∈ [0, 1)` and `index < num_bpts`, whatever the speed and
//!   even when `num_bpts` shrank since the previous call.

use gendy_core::bounds::BoundPolicy;
use gendy_core::distribution::Distribution;
use gendy_core::dsp::{fast_sin, finite_or_zero, lerp, wrap01};
use gendy_core::wavetable::{Shape, WaveTable};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Breakpoint capacity.
pub const MAX_BPTS: usize = 50;
/// Fewest breakpoints a cycle may have.
pub const MIN_BPTS: usize = 2;

/// Walk step for offsets and rates.
const FINE_STEP: f32 = 0.005;
/// Instantaneous carrier frequency is folded below this.
const FM_FOLD_HZ: f32 = 22_050.0;

const AMP_RANGE: (f32, f32) = (-1.0, 1.0);
const DUR_RANGE: (f32, f32) = (0.5, 1.5);
const OFF_RANGE: (f32, f32) = (0.0, 1.0);
const RATE_RANGE: (f32, f32) = (0.7, 1.3);

/// Oscillator configuration. Callers pre-clamp; frequencies are in Hz.
///
/// Rates, frequencies and the modulation index must be finite and ≥ 0. Debug builds
/// assert this; release builds read a NaN/inf as 0 and floor negatives at 0.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GendyParams {
    pub freq: f32,
    /// Breakpoints per cycle, `[MIN_BPTS, MAX_BPTS]`.
    pub num_bpts: usize,
    pub max_amp_step: f32,
    pub max_dur_step: f32,
    /// Grain envelope / source offset rate.
    pub g_rate: f32,
    pub policy: BoundPolicy,
    pub fm: bool,
    pub f_car: f32,
    pub f_mod: f32,
    pub i_mod: f32,
    pub distribution: Distribution,
    pub envelope: Shape,
}

impl Default for GendyParams {
    fn default() -> Self {
        Self {
            freq: 261.626,
            num_bpts: 12,
            max_amp_step: 0.05,
            max_dur_step: 0.05,
            g_rate: 1.0,
            policy: BoundPolicy::Wrap,
            fm: true,
            f_car: 800.0,
            f_mod: 400.0,
            i_mod: 100.0,
            distribution: Distribution::Linear,
            envelope: Shape::Triangle,
        }
    }
}

/// Breakpoint arrays. Only the first `num_bpts` entries are walked; the rest keep
/// whatever they held last.
#[derive(Clone, Debug, PartialEq)]
pub struct Breakpoints {
    pub amps: [f32; MAX_BPTS],
    pub durs: [f32; MAX_BPTS],
    pub offs: [f32; MAX_BPTS],
    pub rates: [f32; MAX_BPTS],
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self {
            amps: [0.0; MAX_BPTS],
            durs: [1.0; MAX_BPTS],
            offs: [0.0; MAX_BPTS],
            rates: [1.0; MAX_BPTS],
        }
    }
}

#[derive(Clone, Debug)]
pub struct StochasticOscillator {
    params: GendyParams,
    bpts: Breakpoints,
    source: WaveTable,
    env: WaveTable,
    rng: SmallRng,

    // segment
    phase: f32,
    index: usize,
    last_flag: bool,
    seg_rate: f32, // segments per second

    // double-buffered breakpoint values
    amp: f32,
    amp_next: f32,
    rate: f32,
    rate_next: f32,
    off: f32,
    off_next: f32,

    // grain envelope positions
    g_idx: f32,
    g_idx_next: f32,

    // fm
    phase_car1: f32,
    phase_car2: f32,
    phase_mod: f32,
    f_inst: f32,

    out: f32,
}

impl Default for StochasticOscillator {
    fn default() -> Self {
        Self::new(GendyParams::default())
    }
}

impl StochasticOscillator {
    /// Oscillator seeded from OS entropy.
    pub fn new(params: GendyParams) -> Self {
        Self::with_rng(params, SmallRng::from_entropy())
    }

    /// Deterministic oscillator; equal seeds give equal output.
    pub fn with_seed(params: GendyParams, seed: u64) -> Self {
        Self::with_rng(params, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(params: GendyParams, rng: SmallRng) -> Self {
        let mut s = Self {
            params,
            bpts: Breakpoints::default(),
            source: WaveTable::new(Shape::Sine),
            env: WaveTable::new(params.envelope),
            rng,
            phase: 0.0,
            index: 0,
            last_flag: false,
            seg_rate: 0.0,
            amp: 0.0,
            amp_next: 0.0,
            rate: 1.0,
            rate_next: 1.0,
            off: 0.0,
            off_next: 0.0,
            g_idx: 0.0,
            g_idx_next: 0.5,
            phase_car1: 0.0,
            phase_car2: 0.0,
            phase_mod: 0.0,
            f_inst: finite_or_zero(params.f_car),
            out: 0.0,
        };
        // prime the first segment so the first `process` already has a target
        let n = s.num_bpts();
        let p = s.controls();
        s.step_breakpoint(n, &p);
        s.last_flag = false;
        s
    }

    // ------------------------------- accessors -------------------------------

    #[inline] pub fn out(&self) -> f32 { self.out }
    /// Set by the call that enters the last breakpoint of the cycle.
    #[inline] pub fn last_flag(&self) -> bool { self.last_flag }
    #[inline] pub fn phase(&self) -> f32 { self.phase }
    #[inline] pub fn index(&self) -> usize { self.index }
    /// Segment phase advance per call for a sample period `dt`.
    #[inline] pub fn speed(&self, dt: f32) -> f32 { self.seg_rate * dt }
    /// Segments per second, as latched at the last boundary.
    #[inline] pub fn segment_rate(&self) -> f32 { self.seg_rate }
    #[inline] pub fn breakpoints(&self) -> &Breakpoints { &self.bpts }
    #[inline] pub fn envelope(&self) -> Shape { self.env.shape() }
    /// Carrier phases in [0, 1), read as radians by the FM grains.
    #[inline] pub fn carrier_phases(&self) -> (f32, f32) { (self.phase_car1, self.phase_car2) }
    /// Instantaneous carrier frequency in Hz, folded below 22.05 kHz.
    #[inline] pub fn carrier_freq(&self) -> f32 { self.f_inst }

    #[inline] pub fn params(&self) -> &GendyParams { &self.params }
    #[inline] pub fn params_mut(&mut self) -> &mut GendyParams { &mut self.params }
    #[inline] pub fn set_params(&mut self, p: GendyParams) { self.params = p; }

    #[inline]
    fn num_bpts(&self) -> usize {
        let n = self.params.num_bpts;
        debug_assert!((MIN_BPTS..=MAX_BPTS).contains(&n), "num_bpts out of range: {n}");
        n.clamp(MIN_BPTS, MAX_BPTS)
    }

    /// Parameter snapshot with every control value made finite and non-negative.
    fn controls(&self) -> GendyParams {
        let p = self.params;
        GendyParams {
            freq: control("freq", p.freq),
            g_rate: control("g_rate", p.g_rate),
            f_car: control("f_car", p.f_car),
            f_mod: control("f_mod", p.f_mod),
            i_mod: control("i_mod", p.i_mod),
            max_amp_step: finite_or_zero(p.max_amp_step),
            max_dur_step: finite_or_zero(p.max_dur_step),
            ..p
        }
    }

    /// Uniform draw in [-1, 1] reshaped by the configured distribution.
    #[inline]
    fn draw(&mut self) -> f32 {
        let r: f32 = self.rng.gen_range(-1.0..=1.0);
        self.params.distribution.sample(r)
    }

    // ------------------------------- segment boundary ------------------------

    /// Promote next → current, move to the next breakpoint and walk it.
    fn step_breakpoint(&mut self, n: usize, p: &GendyParams) {
        self.amp = self.amp_next;
        self.rate = self.rate_next;
        self.off = self.off_next;

        self.index = (self.index + 1) % n;
        if self.index == n - 1 {
            self.last_flag = true;
        }

        let i = self.index;
        let policy = p.policy;
        let (amp_step, dur_step) = (p.max_amp_step, p.max_dur_step);

        let d = self.draw();
        self.bpts.amps[i] = policy.apply(self.bpts.amps[i] + amp_step * d, AMP_RANGE.0, AMP_RANGE.1);
        let d = self.draw();
        self.bpts.durs[i] = policy.apply(self.bpts.durs[i] + dur_step * d, DUR_RANGE.0, DUR_RANGE.1);
        let d = self.draw();
        self.bpts.offs[i] = policy.apply(self.bpts.offs[i] + FINE_STEP * d, OFF_RANGE.0, OFF_RANGE.1);
        let d = self.draw();
        self.bpts.rates[i] = policy.apply(self.bpts.rates[i] + FINE_STEP * d, RATE_RANGE.0, RATE_RANGE.1);

        self.amp_next = self.bpts.amps[i];
        self.rate_next = self.bpts.rates[i];
        // a mirrored overshoot can leave the stored offset outside [0, 1]
        self.off_next = wrap01(self.bpts.offs[i]);

        self.g_idx = self.g_idx_next;
        self.g_idx_next = 0.0;

        self.seg_rate = p.freq * n as f32;
    }

    // ------------------------------- per sample ------------------------------

    /// Advance one sample of duration `dt` seconds; read the result with [`out`](Self::out).
    #[inline]
    pub fn process(&mut self, dt: f32) {
        debug_assert!(dt.is_finite() && dt >= 0.0, "dt must be finite and >= 0, got {dt}");
        let dt = finite_or_zero(dt).max(0.0);
        self.last_flag = false;
        self.env.switch_shape(self.params.envelope);

        let n = self.num_bpts();
        if self.index >= n {
            self.index %= n;
        }

        let p = self.controls();

        // grains
        let (src, src_next) = if p.fm {
            (fast_sin(self.phase_car1), fast_sin(self.phase_car2))
        } else {
            (self.source.get(self.off), self.source.get(self.off_next))
        };
        let g_amp = self.amp + self.env.get(self.g_idx) * src;
        let g_amp_next = self.amp_next + self.env.get(self.g_idx_next) * src_next;
        self.out = lerp(g_amp, g_amp_next, self.phase);

        // grain and offset trackers
        let g_step = p.g_rate * dt;
        self.g_idx = wrap01(self.g_idx + g_step);
        self.g_idx_next = wrap01(self.g_idx_next + g_step);
        self.off = wrap01(self.off + g_step);
        self.off_next = wrap01(self.off_next + g_step);

        // carriers share one modulator
        self.phase_car1 = wrap01(self.phase_car1 + dt * self.f_inst * self.rate);
        self.phase_car2 = wrap01(self.phase_car2 + dt * self.f_inst * self.rate_next);
        self.phase_mod = wrap01(self.phase_mod + dt * p.f_mod);
        self.f_inst = finite_or_zero((p.f_car + p.i_mod * self.source.get(self.phase_mod)) % FM_FOLD_HZ);

        // a rate latched while freq was 0 would never reach another boundary
        if self.seg_rate <= 0.0 || !self.seg_rate.is_finite() {
            self.seg_rate = p.freq * n as f32;
        }

        // segment phase; at most one lap of boundaries per call
        self.phase += self.seg_rate * dt;
        let mut laps = 0;
        while self.phase >= 1.0 && laps < n {
            self.phase -= 1.0;
            self.step_breakpoint(n, &p);
            laps += 1;
        }
        self.phase = if self.phase.is_finite() { wrap01(self.phase) } else { 0.0 };
    }
}

#[inline]
fn control(name: &str, x: f32) -> f32 {
    debug_assert!(x.is_finite() && x >= 0.0, "{name} must be finite and >= 0, got {x}");
    finite_or_zero(x).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 1000.0;

    fn params() -> GendyParams {
        GendyParams::default()
    }

    #[test]
    fn first_segment_is_primed() {
        let osc = StochasticOscillator::with_seed(params(), 1);
        assert_eq!(osc.phase(), 0.0);
        assert_eq!(osc.index(), 1);
        assert!(!osc.last_flag());
        assert!((osc.segment_rate() - 261.626 * 12.0).abs() < 1e-2);
        assert!(osc.speed(DT) > 0.0);
    }

    #[test]
    fn default_config_stays_finite_and_in_range() {
        let mut osc = StochasticOscillator::with_seed(params(), 7);
        for i in 0..10_000 {
            osc.process(DT);
            assert!(osc.out().is_finite(), "i={i}");
            assert!((0.0..1.0).contains(&osc.phase()), "i={i} phase={}", osc.phase());
            assert!(osc.index() < 12, "i={i} index={}", osc.index());
        }
    }

    #[test]
    fn shrinking_breakpoint_count_keeps_index_valid() {
        let mut osc = StochasticOscillator::with_seed(GendyParams { num_bpts: 40, freq: 50.0, ..params() }, 3);
        for _ in 0..500 {
            osc.process(DT);
        }
        let before = osc.breakpoints().clone();
        for n in [3, MIN_BPTS, 17, 5, 40] {
            osc.params_mut().num_bpts = n;
            for _ in 0..200 {
                osc.process(DT);
                assert!(osc.index() < n, "n={n} index={}", osc.index());
                assert!((0.0..1.0).contains(&osc.phase()));
            }
        }
        // entries past every count used above are never walked
        assert_eq!(before.amps[40..], osc.breakpoints().amps[40..]);
        assert_eq!(before.durs[40..], osc.breakpoints().durs[40..]);
    }

    #[test]
    fn very_high_speed_folds_phase() {
        // 5 kHz * 50 breakpoints at 1 kHz: 250 segments per call
        let p = GendyParams { freq: 5_000.0, num_bpts: MAX_BPTS, ..params() };
        let mut osc = StochasticOscillator::with_seed(p, 11);
        for _ in 0..2_000 {
            osc.process(DT);
            assert!(osc.out().is_finite());
            assert!((0.0..1.0).contains(&osc.phase()));
            assert!(osc.index() < MAX_BPTS);
        }
    }

    #[test]
    fn equal_seeds_give_equal_output() {
        let mut a = StochasticOscillator::with_seed(params(), 42);
        let mut b = StochasticOscillator::with_seed(params(), 42);
        let mut c = StochasticOscillator::with_seed(params(), 43);
        let mut diverged = false;
        for _ in 0..5_000 {
            a.process(DT);
            b.process(DT);
            c.process(DT);
            assert_eq!(a.out().to_bits(), b.out().to_bits());
            diverged |= a.out() != c.out();
        }
        assert!(diverged);
    }

    #[test]
    fn wrapped_breakpoints_stay_in_their_ranges() {
        let p = GendyParams { num_bpts: 8, max_amp_step: 0.3, max_dur_step: 0.3, ..params() };
        let mut osc = StochasticOscillator::with_seed(p, 5);
        for _ in 0..20_000 {
            osc.process(DT);
        }
        let b = osc.breakpoints();
        for i in 0..8 {
            assert!((-1.0..=1.0).contains(&b.amps[i]), "amp[{i}]={}", b.amps[i]);
            assert!((0.5..=1.5).contains(&b.durs[i]), "dur[{i}]={}", b.durs[i]);
            assert!((0.0..=1.0).contains(&b.offs[i]), "off[{i}]={}", b.offs[i]);
            assert!((0.7..=1.3).contains(&b.rates[i]), "rate[{i}]={}", b.rates[i]);
        }
    }

    #[test]
    fn last_flag_fires_once_per_cycle() {
        // 100 Hz * 4 breakpoints at 1 kHz → 0.4 segments per call, 400 boundaries
        let p = GendyParams { freq: 100.0, num_bpts: 4, ..params() };
        let mut osc = StochasticOscillator::with_seed(p, 9);
        let mut flags = 0;
        for _ in 0..1_000 {
            osc.process(DT);
            if osc.last_flag() {
                flags += 1;
                assert_eq!(osc.index(), 3);
            }
        }
        assert!((99..=101).contains(&flags), "flags={flags}");
    }

    #[test]
    fn sample_source_output_is_bounded() {
        let p = GendyParams { fm: false, envelope: Shape::Hann, g_rate: 30.0, ..params() };
        let mut osc = StochasticOscillator::with_seed(p, 21);
        for _ in 0..10_000 {
            osc.process(DT);
            // |amp| ≤ 1 plus |env · source| ≤ 1
            assert!(osc.out().abs() <= 2.0 + 1e-5, "out={}", osc.out());
        }
    }

    #[test]
    fn mirrored_cauchy_walk_stays_finite() {
        let p = GendyParams {
            policy: BoundPolicy::Mirror,
            distribution: Distribution::Cauchy,
            max_amp_step: 0.3,
            ..params()
        };
        let mut osc = StochasticOscillator::with_seed(p, 13);
        for _ in 0..10_000 {
            osc.process(DT);
            assert!(osc.out().is_finite());
        }
    }

    #[test]
    fn zero_dt_holds_still() {
        let mut osc = StochasticOscillator::with_seed(params(), 2);
        osc.process(0.0);
        let (phase, index, out) = (osc.phase(), osc.index(), osc.out());
        for _ in 0..100 {
            osc.process(0.0);
        }
        assert_eq!(osc.phase(), phase);
        assert_eq!(osc.index(), index);
        assert_eq!(osc.out(), out);
    }

    #[test]
    fn fm_carriers_read_phase_as_radians() {
        // flat breakpoints and a non-negative envelope leave only env · sin(phase_car)
        let p = GendyParams { max_amp_step: 0.0, max_dur_step: 0.0, fm: true, g_rate: 1_500.0, ..params() };
        let mut osc = StochasticOscillator::with_seed(p, 6);
        let (mut lo, mut hi) = (f32::MAX, f32::MIN);
        for _ in 0..48_000 {
            osc.process(1.0 / 48_000.0);
            lo = lo.min(osc.out());
            hi = hi.max(osc.out());
        }
        assert!(lo >= -1e-6, "lo={lo}");
        assert!(hi > 0.1 && hi <= 1.0_f32.sin() + 1e-3, "hi={hi}");
    }

    #[test]
    fn carriers_advance_by_breakpoint_rates() {
        let p = GendyParams { freq: 10.0, f_car: 100.0, i_mod: 0.0, ..params() };
        let mut osc = StochasticOscillator::with_seed(p, 8);
        osc.process(DT);
        assert_eq!(osc.index(), 1);
        let (c1, c2) = osc.carrier_phases();
        assert!((c1 - 0.1).abs() < 1e-6, "c1={c1}");
        let rate = osc.breakpoints().rates[1];
        assert!((c2 - 0.1 * rate).abs() < 1e-6, "c2={c2} rate={rate}");
    }

    #[test]
    fn carrier_frequency_is_folded() {
        let p = GendyParams { f_car: 30_000.0, i_mod: 0.0, ..params() };
        let mut osc = StochasticOscillator::with_seed(p, 10);
        osc.process(DT);
        assert!((osc.carrier_freq() - 7_950.0).abs() < 1e-2, "f={}", osc.carrier_freq());
    }

    #[test]
    fn zero_freq_pauses_then_resumes() {
        let mut osc = StochasticOscillator::with_seed(params(), 12);
        for _ in 0..100 {
            osc.process(DT);
        }
        osc.params_mut().freq = 0.0;
        for _ in 0..1_000 {
            osc.process(DT);
        }
        assert_eq!(osc.segment_rate(), 0.0);
        let (phase, index) = (osc.phase(), osc.index());
        osc.process(DT);
        assert_eq!((osc.phase(), osc.index()), (phase, index));

        osc.params_mut().freq = 261.626;
        let mut moved = false;
        for _ in 0..100 {
            osc.process(DT);
            moved |= osc.index() != index;
        }
        assert!(osc.segment_rate() > 0.0);
        assert!(moved);
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn nan_freq_recovers_once_restored() {
        let mut osc = StochasticOscillator::with_seed(params(), 14);
        osc.params_mut().freq = f32::NAN;
        for _ in 0..200 {
            osc.process(DT);
            assert!(osc.out().is_finite());
        }
        osc.params_mut().freq = 261.626;
        for _ in 0..1_000 {
            osc.process(DT);
            assert!(osc.out().is_finite());
            assert!((0.0..1.0).contains(&osc.phase()));
        }
        assert!(osc.segment_rate() > 0.0);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "freq must be finite")]
    fn nan_freq_asserts_in_debug() {
        let mut osc = StochasticOscillator::with_seed(params(), 14);
        osc.params_mut().freq = f32::NAN;
        osc.process(DT);
    }

    #[test]
    fn envelope_follows_params() {
        let mut osc = StochasticOscillator::with_seed(params(), 4);
        assert_eq!(osc.envelope(), Shape::Triangle);
        osc.params_mut().envelope = Shape::Tukey;
        osc.process(DT);
        assert_eq!(osc.envelope(), Shape::Tukey);
    }
}
