//! Tempo controller — the shared BPM, readable and writable from any thread.
//!
//! The tempo is stored as the bit pattern of an `f64` inside an [`AtomicU64`],
//! so a reader never observes a half-written value. Changes only affect beats
//! computed after the write; nothing already scheduled is re-timed.

use std::sync::atomic::{AtomicU64, Ordering};

/// Tempo a fresh controller starts at.
pub const DEFAULT_BPM: f64 = 180.0;

/// Rejected tempo values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TempoError {
    /// Zero, negative, NaN or infinite BPM.
    Invalid(f64),
}

impl std::fmt::Display for TempoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TempoError::Invalid(bpm) => {
                write!(f, "invalid tempo {bpm} BPM: must be positive and finite")
            }
        }
    }
}

impl std::error::Error for TempoError {}

/// Seconds between two beats at `bpm`.
#[inline]
pub fn seconds_per_beat(bpm: f64) -> f64 {
    60.0 / bpm
}

fn validate(bpm: f64) -> Result<f64, TempoError> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(bpm)
    } else {
        Err(TempoError::Invalid(bpm))
    }
}

/// Atomically updated tempo in beats per minute.
#[derive(Debug)]
pub struct Tempo {
    bits: AtomicU64,
}

impl Tempo {
    /// Create a controller holding `bpm`.
    pub fn new(bpm: f64) -> Result<Self, TempoError> {
        let bpm = validate(bpm)?;
        Ok(Self {
            bits: AtomicU64::new(bpm.to_bits()),
        })
    }

    /// Replace the tempo. Invalid values are rejected and the previous tempo kept.
    pub fn set_bpm(&self, bpm: f64) -> Result<(), TempoError> {
        let bpm = validate(bpm)?;
        self.bits.store(bpm.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    /// Current tempo.
    pub fn bpm(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            bits: AtomicU64::new(DEFAULT_BPM.to_bits()),
        }
    }
}
