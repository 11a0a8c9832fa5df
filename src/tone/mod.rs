//! Tone emitter — turns beat events into scheduled clicks on the audio output.
//!
//! A click is a short sine burst at a fixed pitch with a 1 ms attack and an
//! exponential decay to near silence by 50 ms, so consecutive clicks never
//! ring into each other even at 200 BPM. The emitter only hands events to the
//! output's absolute-time scheduling primitive; the sample-accurate rendering
//! happens in [`voice`] on the audio thread.

pub mod voice;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::audio::AudioOutput;

pub use voice::ClickVoice;

/// Fixed parameters of the click sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickTone {
    /// Pitch in Hz.
    pub frequency_hz: f64,
    /// Rise time from silence to peak, in seconds.
    pub attack: f64,
    /// Time from onset until the tone reaches `floor` and stops, in seconds.
    pub decay: f64,
    /// Fraction of peak the decay ends at.
    pub floor: f64,
    /// Peak amplitude.
    pub gain: f64,
}

impl ClickTone {
    /// Total sounding time of one click.
    pub fn duration(&self) -> f64 {
        self.decay.max(self.attack)
    }

    /// Envelope amplitude `t` seconds after the onset.
    ///
    /// - `[0, attack)`: linear rise to `gain`.
    /// - `[attack, decay)`: exponential fall from `gain` to `gain * floor`.
    /// - otherwise: silence.
    pub fn amplitude(&self, t: f64) -> f64 {
        if t < 0.0 || t >= self.duration() {
            return 0.0;
        }
        if t < self.attack {
            return self.gain * t / self.attack;
        }
        let span = self.decay - self.attack;
        if span <= 0.0 {
            return 0.0;
        }
        let progress = (t - self.attack) / span;
        self.gain * self.floor.powf(progress)
    }
}

impl Default for ClickTone {
    fn default() -> Self {
        Self {
            frequency_hz: 880.0,
            attack: 0.001,
            decay: 0.05,
            floor: 0.001,
            gain: 1.0,
        }
    }
}

/// One click at an absolute time on the audio clock.
///
/// Once handed to an [`AudioOutput`] it belongs to the audio subsystem and
/// cannot be recalled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEvent {
    /// Ordinal of the beat within its run, starting at 0.
    pub index: u64,
    /// Onset time in seconds on the output's clock.
    pub time: f64,
    pub tone: ClickTone,
}

/// Whether clicks actually reach an audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    /// Clicks are scheduled on a real output.
    Live,
    /// The output could not be opened; scheduling continues without sound.
    Silent,
}

/// Hands beat events to an audio output, or swallows them in silent mode.
pub struct ToneEmitter {
    output: Arc<dyn AudioOutput>,
    mode: AudioMode,
    scheduled: u64,
    dropped: u64,
}

impl ToneEmitter {
    pub fn new(output: Arc<dyn AudioOutput>, mode: AudioMode) -> Self {
        Self {
            output,
            mode,
            scheduled: 0,
            dropped: 0,
        }
    }

    /// Current time on the output's clock, in seconds.
    pub fn current_time(&self) -> f64 {
        self.output.current_time()
    }

    /// Program a click for `event`. Failures are logged and the click is lost.
    pub fn emit(&mut self, event: &BeatEvent) {
        if self.mode == AudioMode::Silent {
            return;
        }
        match self.output.schedule(event) {
            Ok(()) => {
                self.scheduled += 1;
                debug!(index = event.index, time = event.time, "click scheduled");
            }
            Err(e) => {
                self.dropped += 1;
                warn!(index = event.index, error = %e, "click dropped");
            }
        }
    }

    pub fn mode(&self) -> AudioMode {
        self.mode
    }

    /// Clicks accepted by the output.
    pub fn scheduled(&self) -> u64 {
        self.scheduled
    }

    /// Clicks the output refused.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
