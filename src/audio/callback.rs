//! Audio callback — runs on the cpal audio thread.
//!
//! Drains commands from the ring buffer, mixes every active click voice into
//! the output on its exact frame, applies volume and a hard ceiling, then
//! publishes the new frame count as the output clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::traits::Consumer;
use ringbuf::HeapCons;

use super::command::AudioCommand;
use crate::tone::ClickVoice;

/// Upper bound on simultaneously sounding clicks. Further clicks are dropped.
const MAX_VOICES: usize = 32;

/// Output is clamped to `[-CEILING, CEILING]`.
const CEILING: f32 = 0.95;

/// State that lives on the audio thread. Accessed only from the cpal callback.
pub struct AudioCallback {
    consumer: HeapCons<AudioCommand>,
    voices: Vec<ClickVoice>,
    frames: Arc<AtomicU64>,
    frames_rendered: u64,
    volume: f32,
    channels: u16,
    sample_rate: u32,
}

impl AudioCallback {
    /// Create a new audio callback. `frames` is the shared output clock.
    pub fn new(
        consumer: HeapCons<AudioCommand>,
        frames: Arc<AtomicU64>,
        channels: u16,
        sample_rate: u32,
    ) -> Self {
        Self {
            consumer,
            voices: Vec::with_capacity(MAX_VOICES),
            frames,
            frames_rendered: 0,
            volume: 1.0,
            channels,
            sample_rate,
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Called by cpal for each output block. Fills `output` with interleaved samples.
    pub fn process(&mut self, output: &mut [f32]) {
        let block_start = self.frames_rendered;

        // 1. Drain pending commands; late clicks start on the first frame of this block.
        while let Some(cmd) = self.consumer.try_pop() {
            match cmd {
                AudioCommand::Schedule { start_frame, tone } => {
                    if self.voices.len() < MAX_VOICES {
                        self.voices.push(ClickVoice::new(
                            start_frame.max(block_start),
                            tone,
                            self.sample_rate,
                        ));
                    }
                }
                AudioCommand::SetVolume(v) => self.set_volume(v),
            }
        }

        // 2. Mix voices frame by frame.
        let channels = self.channels.max(1) as usize;
        for (i, frame) in output.chunks_mut(channels).enumerate() {
            let position = block_start + i as u64;
            let mixed: f32 = self.voices.iter().map(|v| v.sample_at(position)).sum();
            let value = (mixed * self.volume).clamp(-CEILING, CEILING);
            frame.fill(value);
        }

        // 3. Advance the clock and retire finished voices.
        let frames = (output.len() / channels) as u64;
        self.frames_rendered = block_start + frames;
        let now = self.frames_rendered;
        self.voices.retain(|v| !v.is_finished(now));
        self.frames.store(now, Ordering::Release);
    }

    /// Number of clicks currently queued or sounding.
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }
}
