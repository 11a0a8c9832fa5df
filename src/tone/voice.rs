//! Click voice — renders one scheduled click, frame by frame, on the audio thread.

use std::f64::consts::TAU;

use super::ClickTone;

/// A click pinned to an absolute frame of the output stream.
///
/// The voice computes each sample from its offset to `start_frame`, so the
/// onset lands on exactly that frame no matter how the stream is split into
/// callback blocks.
#[derive(Debug, Clone, Copy)]
pub struct ClickVoice {
    start_frame: u64,
    length_frames: u64,
    tone: ClickTone,
    sample_rate: f64,
}

impl ClickVoice {
    pub fn new(start_frame: u64, tone: ClickTone, sample_rate: u32) -> Self {
        let sample_rate = sample_rate as f64;
        Self {
            start_frame,
            length_frames: (tone.duration() * sample_rate).round() as u64,
            tone,
            sample_rate,
        }
    }

    /// Convert a time on the output clock to the nearest frame.
    pub fn frame_for_time(time: f64, sample_rate: u32) -> u64 {
        (time.max(0.0) * sample_rate as f64).round() as u64
    }

    /// First frame after the click has fully decayed.
    pub fn end_frame(&self) -> u64 {
        self.start_frame.saturating_add(self.length_frames)
    }

    /// Sample value at absolute `frame`. Zero outside the click.
    #[inline]
    pub fn sample_at(&self, frame: u64) -> f32 {
        if frame < self.start_frame || frame >= self.end_frame() {
            return 0.0;
        }
        let t = (frame - self.start_frame) as f64 / self.sample_rate;
        let value = (TAU * self.tone.frequency_hz * t).sin() * self.tone.amplitude(t);
        value as f32
    }

    /// Whether the click has nothing left to play once `frame` is reached.
    pub fn is_finished(&self, frame: u64) -> bool {
        frame >= self.end_frame()
    }
}
