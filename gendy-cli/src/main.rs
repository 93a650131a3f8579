//! Gendy CLI — offline renderer and meter for the stochastic voices.
//!
//! Renders a voice for a fixed duration without touching an audio device and logs a
//! meter line (peak, limiter gain reduction, makeup gain) for every second of audio.

use anyhow::{ensure, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use gendy_core::bounds::BoundPolicy;
use gendy_core::distribution::Distribution;
use gendy_core::dsp::{lin_to_db, TAU};
use gendy_core::limiter::LookaheadLimiter;
use gendy_core::wavetable::Shape;
use gendy_engine::{
    EchoParams, Engine, EnsembleParams, GendyParams, Generator, GrandyVoice, OscillatorEnsemble, StitcherVoice,
    StochasticEcho, StochasticOscillator, MAX_BPTS, MAX_VOICES, MIN_BPTS,
};
use tracing::{debug, info, Level};

const BLOCK: usize = 512;
/// Test tone fed to the echo while it captures.
const ECHO_TONE_HZ: f32 = 220.0;

#[derive(Parser)]
#[command(name = "gendy")]
#[command(about = "Offline renderer for dynamic stochastic synthesis voices", long_about = None)]
struct Cli {
    /// Sample rate in Hz
    #[arg(short = 'r', long, default_value = "48000", global = true)]
    sample_rate: u32,

    /// Seconds of audio to render
    #[arg(short, long, default_value = "5.0", global = true)]
    duration: f32,

    /// Seed for reproducible renders (entropy when omitted)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Single stochastic oscillator through the limiter
    Grandy {
        #[command(flatten)]
        voice: VoiceArgs,
    },

    /// Up to four oscillators played in turn
    Stitcher {
        #[command(flatten)]
        voice: VoiceArgs,

        /// Voices in rotation
        #[arg(long, default_value = "4")]
        voices: usize,

        /// Cycles each voice plays before handing over
        #[arg(long, default_value = "1")]
        stutter: u32,
    },

    /// Stochastic walk over a captured test tone
    Echo {
        /// Samples between breakpoints
        #[arg(long, default_value = "1500")]
        spacing: usize,

        /// Looping fraction of the capture buffer
        #[arg(long, default_value = "1.0")]
        length: f32,

        /// Keep walking amplitudes instead of restarting each visit
        #[arg(long)]
        accumulate: bool,

        #[arg(long, value_enum, default_value = "linear")]
        distribution: DistArg,

        #[arg(long, value_enum, default_value = "triangle")]
        envelope: EnvArg,

        #[arg(long)]
        mirror: bool,
    },
}

#[derive(Args, Clone, Copy)]
struct VoiceArgs {
    /// Oscillator frequency in Hz
    #[arg(short, long, default_value = "261.626")]
    freq: f32,

    /// Breakpoints per cycle
    #[arg(short, long, default_value = "12")]
    bpts: usize,

    #[arg(long, value_enum, default_value = "linear")]
    distribution: DistArg,

    /// Mirror breakpoints at their bounds instead of wrapping
    #[arg(long)]
    mirror: bool,

    /// Read grains from the sine table instead of the FM carriers
    #[arg(long)]
    no_fm: bool,

    #[arg(long, value_enum, default_value = "triangle")]
    envelope: EnvArg,

    /// Maximum amplitude step per cycle
    #[arg(long, default_value = "0.05")]
    amp_step: f32,

    /// Maximum duration step per cycle
    #[arg(long, default_value = "0.05")]
    dur_step: f32,

    /// Grain rate in Hz
    #[arg(long, default_value = "1.0")]
    g_rate: f32,
}

#[derive(Copy, Clone, ValueEnum)]
enum DistArg {
    Linear,
    Cauchy,
    Arcsine,
}

impl From<DistArg> for Distribution {
    fn from(d: DistArg) -> Self {
        match d {
            DistArg::Linear => Distribution::Linear,
            DistArg::Cauchy => Distribution::Cauchy,
            DistArg::Arcsine => Distribution::Arcsine,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum EnvArg {
    Sine,
    Triangle,
    Hann,
    Welch,
    Tukey,
}

impl From<EnvArg> for Shape {
    fn from(e: EnvArg) -> Self {
        match e {
            EnvArg::Sine => Shape::Sine,
            EnvArg::Triangle => Shape::Triangle,
            EnvArg::Hann => Shape::Hann,
            EnvArg::Welch => Shape::Welch,
            EnvArg::Tukey => Shape::Tukey,
        }
    }
}

impl VoiceArgs {
    fn params(&self) -> Result<GendyParams> {
        ensure!(
            (MIN_BPTS..=MAX_BPTS).contains(&self.bpts),
            "--bpts must be in {MIN_BPTS}..={MAX_BPTS}, got {}",
            self.bpts
        );
        ensure!(self.freq.is_finite() && self.freq > 0.0, "--freq must be positive, got {}", self.freq);
        ensure!(self.g_rate.is_finite() && self.g_rate >= 0.0, "--g-rate must be >= 0, got {}", self.g_rate);
        Ok(GendyParams {
            freq: self.freq,
            num_bpts: self.bpts,
            max_amp_step: self.amp_step,
            max_dur_step: self.dur_step,
            g_rate: self.g_rate,
            policy: BoundPolicy::from_mirroring(self.mirror),
            fm: !self.no_fm,
            distribution: self.distribution.into(),
            envelope: self.envelope.into(),
            ..GendyParams::default()
        })
    }
}

// ----------------------------------- Metering ------------------------------------

/// Voices whose limiter can be metered.
trait Metered: Generator {
    fn limiter(&self) -> &LookaheadLimiter;
}

impl Metered for GrandyVoice {
    fn limiter(&self) -> &LookaheadLimiter {
        GrandyVoice::limiter(self)
    }
}

impl Metered for StitcherVoice {
    fn limiter(&self) -> &LookaheadLimiter {
        StitcherVoice::limiter(self)
    }
}

#[derive(Default)]
struct Meter {
    peak: f32,
    overall: f32,
    count: usize,
    second: usize,
}

impl Meter {
    fn feed(&mut self, block: &[f32]) {
        let peak = block.iter().fold(0.0_f32, |m, x| m.max(x.abs()));
        self.peak = self.peak.max(peak);
        self.overall = self.overall.max(peak);
        self.count += block.len();
    }

    /// Emit a line once a second's worth of samples has gone by.
    fn tick(&mut self, sr: usize, limiter: Option<&LookaheadLimiter>) {
        if self.count < sr {
            return;
        }
        self.second += 1;
        match limiter {
            Some(l) => info!(
                second = self.second,
                peak = self.peak,
                gr_db = lin_to_db(l.gain_reduction()),
                makeup = l.makeup_gain(),
                "meter"
            ),
            None => info!(second = self.second, peak = self.peak, "meter"),
        }
        self.peak = 0.0;
        self.count -= sr;
    }
}

fn render_voice<G: Metered>(voice: G, sr: u32, frames: usize) -> f32 {
    let mut engine = Engine::new(voice, sr as f32);
    let mut block = [0.0_f32; BLOCK];
    let mut meter = Meter::default();
    let mut left = frames;
    while left > 0 {
        let n = left.min(BLOCK);
        engine.render(&mut block[..n]);
        meter.feed(&block[..n]);
        meter.tick(sr as usize, Some(engine.generator().limiter()));
        left -= n;
    }
    debug!(frames = engine.frames(), seconds = engine.time(), "render finished");
    meter.overall
}

fn render_echo(mut echo: StochasticEcho, sr: u32, frames: usize) -> f32 {
    let mut block = [0.0_f32; BLOCK];
    let mut meter = Meter::default();
    let step = TAU * ECHO_TONE_HZ / sr as f32;
    let mut phase = 0.0_f32;
    let mut done = 0;
    echo.gate();
    while done < frames {
        let n = (frames - done).min(BLOCK);
        for y in &mut block[..n] {
            *y = echo.process(phase.sin());
            phase = (phase + step) % TAU;
        }
        meter.feed(&block[..n]);
        meter.tick(sr as usize, None);
        done += n;
    }
    meter.overall
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    ensure!(cli.sample_rate > 0, "--sample-rate must be positive");
    ensure!(
        cli.duration.is_finite() && cli.duration > 0.0,
        "--duration must be positive, got {}",
        cli.duration
    );
    let sr = cli.sample_rate;
    let frames = (cli.duration * sr as f32) as usize;
    let seed = cli.seed;

    let peak = match cli.command {
        Commands::Grandy { voice } => {
            let p = voice.params()?;
            let osc = match seed {
                Some(s) => StochasticOscillator::with_seed(p, s),
                None => StochasticOscillator::new(p),
            };
            info!(freq = p.freq, bpts = p.num_bpts, fm = p.fm, sr, "rendering grandy voice");
            let voice = GrandyVoice::new(osc, sr as f32).context("building grandy voice")?;
            render_voice(voice, sr, frames)
        }
        Commands::Stitcher { voice, voices, stutter } => {
            ensure!((1..=MAX_VOICES).contains(&voices), "--voices must be in 1..={MAX_VOICES}, got {voices}");
            let p = voice.params()?;
            let ep = EnsembleParams { active_voices: voices, stutters: [stutter.max(1); MAX_VOICES] };
            let ensemble = match seed {
                Some(s) => OscillatorEnsemble::with_seed(ep, p, s),
                None => OscillatorEnsemble::new(ep, p),
            };
            info!(voices, stutter, freq = p.freq, sr, "rendering stitcher voice");
            let voice = StitcherVoice::new(ensemble, sr as f32).context("building stitcher voice")?;
            render_voice(voice, sr, frames)
        }
        Commands::Echo { spacing, length, accumulate, distribution, envelope, mirror } => {
            ensure!(spacing >= 1, "--spacing must be at least 1");
            let params = EchoParams {
                length,
                spacing,
                accumulate,
                distribution: distribution.into(),
                envelope: envelope.into(),
                policy: BoundPolicy::from_mirroring(mirror),
                ..EchoParams::default()
            };
            let capacity = sr as usize;
            let echo = match seed {
                Some(s) => StochasticEcho::with_seed(params, capacity, s),
                None => StochasticEcho::with_capacity(params, capacity),
            }
            .context("building echo")?;
            info!(spacing, length, capacity, "rendering echo over a {ECHO_TONE_HZ} Hz tone");
            render_echo(echo, sr, frames)
        }
    };

    info!(frames, peak, peak_db = lin_to_db(peak), "done");
    Ok(())
}
