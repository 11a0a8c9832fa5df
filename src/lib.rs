//! Stride — a drift-free cadence metronome for slow jogging.
//!
//! The [`scheduler::Metronome`] produces clicks at an exact tempo by
//! scheduling them a short horizon ahead on the audio output's own clock,
//! driven by a coarse, jitter-tolerant wake loop.

pub mod audio;
pub mod config;
pub mod scheduler;
pub mod session;
pub mod tempo;
pub mod tone;
