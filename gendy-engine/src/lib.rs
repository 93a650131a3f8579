//! Gendy Engine — stochastic oscillators, ensembles, echo and voice glue.
//!
//! Crate layout:
//! - [`graph`]      : `Generator` trait and `Engine<G>` wrapper
//! - [`oscillator`] : breakpoint random-walk oscillator with grain crossfade and FM
//! - [`ensemble`]   : up to four oscillators played in turn with crossfaded handoff
//! - [`echo`]       : breakpoint walk over a captured sample loop
//! - [`voices`]     : oscillator/ensemble → limiter voices that implement `Generator`
//!
//! The engine deliberately avoids heap allocations in the audio thread.
//! Parameters are plain `Copy` snapshots the caller may rewrite every sample.

pub mod echo;
pub mod ensemble;
pub mod graph;
pub mod oscillator;
pub mod voices;

// Re-export some commonly used items to make downstream imports ergonomic.
pub use echo::{EchoParams, StochasticEcho};
pub use ensemble::{EnsembleParams, OscillatorEnsemble, MAX_VOICES};
pub use graph::{Engine, Generator};
pub use oscillator::{GendyParams, StochasticOscillator, MAX_BPTS, MIN_BPTS};
pub use voices::{GrandyVoice, StitcherVoice};
