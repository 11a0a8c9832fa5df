//! Hand-driven audio output for tests and simulations.
//!
//! [`ManualOutput`] has a clock that only moves when told to and records every
//! scheduled click, so beat timing can be checked exactly without hardware.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{AudioDevice, AudioError, AudioOutput};
use crate::tone::BeatEvent;

/// Output with a settable clock and an event log.
#[derive(Debug, Default)]
pub struct ManualOutput {
    now: AtomicU64,
    events: Mutex<Vec<BeatEvent>>,
    refusal: Mutex<Option<AudioError>>,
}

impl ManualOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock to `time` seconds.
    pub fn set_time(&self, time: f64) {
        self.now.store(time.to_bits(), Ordering::Release);
    }

    /// Move the clock forward by `dt` seconds.
    pub fn advance(&self, dt: f64) {
        self.set_time(self.current_time() + dt);
    }

    /// Make every following `schedule` call fail with `error`; `None` accepts again.
    pub fn refuse_with(&self, error: Option<AudioError>) {
        *lock(&self.refusal) = error;
    }

    /// Everything scheduled so far, in submission order.
    pub fn events(&self) -> Vec<BeatEvent> {
        lock(&self.events).clone()
    }

    /// Onset times of everything scheduled so far.
    pub fn times(&self) -> Vec<f64> {
        lock(&self.events).iter().map(|e| e.time).collect()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl AudioOutput for ManualOutput {
    fn current_time(&self) -> f64 {
        f64::from_bits(self.now.load(Ordering::Acquire))
    }

    fn schedule(&self, event: &BeatEvent) -> Result<(), AudioError> {
        if let Some(error) = lock(&self.refusal).clone() {
            return Err(error);
        }
        lock(&self.events).push(*event);
        Ok(())
    }
}

/// Device wrapper around a [`ManualOutput`], with scriptable failures.
#[derive(Debug)]
pub struct ManualDevice {
    output: Arc<ManualOutput>,
    available: bool,
    suspended: bool,
    resumable: bool,
    opens: usize,
    resumes: usize,
    volume: f32,
}

impl ManualDevice {
    /// A device that opens and plays normally.
    pub fn new() -> Self {
        Self {
            output: Arc::new(ManualOutput::new()),
            available: true,
            suspended: false,
            resumable: true,
            opens: 0,
            resumes: 0,
            volume: 1.0,
        }
    }

    /// A device whose `open` always fails.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// A device that opens suspended; `resumable` decides whether resume succeeds.
    pub fn suspended(resumable: bool) -> Self {
        Self {
            suspended: true,
            resumable,
            ..Self::new()
        }
    }

    /// Let a previously unavailable device open on the next attempt.
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// Handle to the underlying output, for driving the clock and reading events.
    pub fn output(&self) -> Arc<ManualOutput> {
        Arc::clone(&self.output)
    }

    /// Number of successful opens.
    pub fn open_count(&self) -> usize {
        self.opens
    }

    /// Number of resume attempts.
    pub fn resume_count(&self) -> usize {
        self.resumes
    }

    /// Last volume set on the device.
    pub fn volume(&self) -> f32 {
        self.volume
    }
}

impl Default for ManualDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDevice for ManualDevice {
    fn open(&mut self) -> Result<Arc<dyn AudioOutput>, AudioError> {
        if !self.available {
            return Err(AudioError::NoOutputDevice);
        }
        self.opens += 1;
        Ok(self.output.clone())
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.resumes += 1;
        if !self.resumable {
            return Err(AudioError::StreamPlay("resume refused".to_string()));
        }
        self.suspended = false;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), AudioError> {
        self.volume = volume;
        Ok(())
    }
}
