//! The seams between the scheduler and whatever produces sound.

use std::sync::Arc;
use std::time::Instant;

use super::AudioError;
use crate::tone::BeatEvent;

/// Clock and absolute-time scheduling primitive of an opened audio output.
///
/// Shared with the driver thread, hence `Send + Sync`.
pub trait AudioOutput: Send + Sync {
    /// Monotonic time in seconds on the output's own clock.
    fn current_time(&self) -> f64;

    /// Program a click to sound at `event.time` on [`current_time`](Self::current_time)'s timebase.
    fn schedule(&self, event: &BeatEvent) -> Result<(), AudioError>;
}

/// An audio output that is opened lazily, on the first metronome start.
pub trait AudioDevice {
    /// Open the output, or return the already-opened one.
    fn open(&mut self) -> Result<Arc<dyn AudioOutput>, AudioError>;

    /// Whether an opened output is currently paused.
    fn is_suspended(&self) -> bool;

    /// Resume a paused output.
    fn resume(&mut self) -> Result<(), AudioError>;

    /// Set the master volume (0.0-1.0), now and for outputs opened later.
    fn set_volume(&mut self, volume: f32) -> Result<(), AudioError>;
}

impl<D: AudioDevice + ?Sized> AudioDevice for Box<D> {
    fn open(&mut self) -> Result<Arc<dyn AudioOutput>, AudioError> {
        (**self).open()
    }

    fn is_suspended(&self) -> bool {
        (**self).is_suspended()
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        (**self).resume()
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), AudioError> {
        (**self).set_volume(volume)
    }
}

/// Fallback output for silent mode: wall-clock time, scheduling does nothing.
#[derive(Debug)]
pub struct SilentOutput {
    origin: Instant,
}

impl SilentOutput {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SilentOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for SilentOutput {
    fn current_time(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn schedule(&self, _event: &BeatEvent) -> Result<(), AudioError> {
        Ok(())
    }
}

/// A device that never opens. Forces silent mode.
#[derive(Debug, Default)]
pub struct NullDevice;

impl AudioDevice for NullDevice {
    fn open(&mut self) -> Result<Arc<dyn AudioOutput>, AudioError> {
        Err(AudioError::Disabled)
    }

    fn is_suspended(&self) -> bool {
        false
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        Err(AudioError::Disabled)
    }

    fn set_volume(&mut self, _volume: f32) -> Result<(), AudioError> {
        Ok(())
    }
}
