//! Audio subsystem — cpal output stream, lock-free command queue, frame clock.
//!
//! The [`AudioEngine`] owns the cpal stream. Everything the scheduling thread
//! needs goes through an [`EngineOutput`]: it reads the stream's frame clock
//! and pushes [`AudioCommand`]s into a ring buffer that the audio callback
//! drains once per block. Clicks are rendered on the exact frame they were
//! scheduled for, independent of when the command arrived.

pub mod callback;
pub mod command;
pub mod manual;
pub mod output;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    traits::{Producer, Split},
    HeapRb,
};
use tracing::{debug, error, info};

pub use command::AudioCommand;
pub use manual::{ManualDevice, ManualOutput};
pub use output::{AudioDevice, AudioOutput, NullDevice, SilentOutput};

use crate::tone::{BeatEvent, ClickVoice};
use callback::AudioCallback;

/// Ring buffer capacity (number of commands).
const RING_BUFFER_CAPACITY: usize = 256;

/// Audio subsystem errors.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// No audio output device found.
    NoOutputDevice,
    /// Audio output turned off by configuration.
    Disabled,
    /// Failed to query device configuration.
    DeviceConfig(String),
    /// Failed to build the audio stream.
    StreamBuild(String),
    /// Failed to start or resume the audio stream.
    StreamPlay(String),
    /// Ring buffer is full; the audio thread is not draining it.
    BufferFull,
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::NoOutputDevice => write!(f, "no audio output device found"),
            AudioError::Disabled => write!(f, "audio output disabled"),
            AudioError::DeviceConfig(e) => write!(f, "device config error: {e}"),
            AudioError::StreamBuild(e) => write!(f, "stream build error: {e}"),
            AudioError::StreamPlay(e) => write!(f, "stream play error: {e}"),
            AudioError::BufferFull => write!(f, "audio command ring buffer is full"),
        }
    }
}

impl std::error::Error for AudioError {}

/// Thread-safe side of the engine: frame clock plus command producer.
pub struct EngineOutput {
    frames: Arc<AtomicU64>,
    producer: Mutex<ringbuf::HeapProd<AudioCommand>>,
    sample_rate: u32,
}

impl EngineOutput {
    fn push(&self, command: AudioCommand) -> Result<(), AudioError> {
        let mut producer = self.producer.lock().unwrap_or_else(|e| e.into_inner());
        producer
            .try_push(command)
            .map_err(|_| AudioError::BufferFull)
    }

    /// Set master volume (clamped to 0.0..=1.0 on the audio thread).
    fn set_volume(&self, volume: f32) -> Result<(), AudioError> {
        self.push(AudioCommand::SetVolume(volume))
    }

    /// Frames rendered by the stream so far.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioOutput for EngineOutput {
    fn current_time(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    fn schedule(&self, event: &BeatEvent) -> Result<(), AudioError> {
        self.push(AudioCommand::Schedule {
            start_frame: ClickVoice::frame_for_time(event.time, self.sample_rate),
            tone: event.tone,
        })
    }
}

/// The audio engine. Owns the cpal stream and hands out its [`EngineOutput`].
///
/// `cpal::Stream` is not `Send`, so the engine stays on the thread that
/// created it; only the output handle crosses to the driver thread.
pub struct AudioEngine {
    stream: cpal::Stream,
    output: Arc<EngineOutput>,
    channels: u16,
}

impl AudioEngine {
    /// Create and start the audio engine with the default output device.
    pub fn new(volume: f32) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        Self::build_with_device(&device, sample_rate, channels, volume)
    }

    /// Internal builder: sets up ring buffer, callback, and stream.
    fn build_with_device(
        device: &cpal::Device,
        sample_rate: u32,
        channels: u16,
        volume: f32,
    ) -> Result<Self, AudioError> {
        let rb = HeapRb::<AudioCommand>::new(RING_BUFFER_CAPACITY);
        let (producer, consumer) = rb.split();

        let frames = Arc::new(AtomicU64::new(0));
        let mut audio_callback =
            AudioCallback::new(consumer, Arc::clone(&frames), channels, sample_rate);
        audio_callback.set_volume(volume);

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_fn = |err: cpal::StreamError| {
            error!("audio stream error: {err}");
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    audio_callback.process(data);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        info!(sample_rate, channels, "audio output opened");

        Ok(Self {
            stream,
            output: Arc::new(EngineOutput {
                frames,
                producer: Mutex::new(producer),
                sample_rate,
            }),
            channels,
        })
    }

    /// Shared handle for clock reads and scheduling.
    pub fn output(&self) -> Arc<EngineOutput> {
        Arc::clone(&self.output)
    }

    pub fn sample_rate(&self) -> u32 {
        self.output.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Pause the audio stream. The frame clock stops with it.
    pub fn pause(&self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))
    }

    /// Resume the audio stream.
    pub fn play(&self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))
    }
}

/// [`AudioDevice`] backed by the default cpal output, opened on first use.
pub struct CpalDevice {
    volume: f32,
    engine: Option<AudioEngine>,
    suspended: bool,
}

impl CpalDevice {
    pub fn new(volume: f32) -> Self {
        Self {
            volume,
            engine: None,
            suspended: false,
        }
    }

    /// Pause the stream; the next metronome start resumes it.
    pub fn suspend(&mut self) -> Result<(), AudioError> {
        if let Some(engine) = &self.engine {
            engine.pause()?;
            self.suspended = true;
        }
        Ok(())
    }
}

impl AudioDevice for CpalDevice {
    fn open(&mut self) -> Result<Arc<dyn AudioOutput>, AudioError> {
        let engine = match self.engine.take() {
            Some(engine) => engine,
            None => AudioEngine::new(self.volume)?,
        };
        let output = engine.output();
        self.engine = Some(engine);
        Ok(output)
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if let Some(engine) = &self.engine {
            engine.play()?;
            debug!("audio output resumed");
        }
        self.suspended = false;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), AudioError> {
        self.volume = volume;
        match &self.engine {
            Some(engine) => engine.output.set_volume(volume),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires an audio device. Run manually with `cargo test -- --ignored`
    fn test_audio_engine_creation() {
        let engine = AudioEngine::new(0.5);
        assert!(
            engine.is_ok(),
            "AudioEngine::new() failed: {:?}",
            engine.err()
        );
        let engine = engine.unwrap();
        assert!(engine.sample_rate() > 0);
        assert!(engine.channels() > 0);
    }

    #[test]
    #[ignore] // Requires audio device
    fn test_clock_advances() {
        let engine = AudioEngine::new(0.0).expect("no audio device");
        let output = engine.output();
        std::thread::sleep(std::time::Duration::from_millis(200));
        assert!(output.current_time() > 0.0);
    }

    #[test]
    #[ignore] // Requires audio device
    fn test_suspend_and_resume() {
        let mut device = CpalDevice::new(0.0);
        device.open().expect("no audio device");
        device.suspend().unwrap();
        assert!(device.is_suspended());
        device.resume().unwrap();
        assert!(!device.is_suspended());
    }

    #[test]
    fn test_audio_error_display() {
        assert_eq!(
            AudioError::NoOutputDevice.to_string(),
            "no audio output device found"
        );
        assert_eq!(
            AudioError::BufferFull.to_string(),
            "audio command ring buffer is full"
        );
        assert_eq!(
            AudioError::DeviceConfig("test".to_string()).to_string(),
            "device config error: test"
        );
        assert_eq!(AudioError::Disabled.to_string(), "audio output disabled");
    }

    #[test]
    fn test_volume_before_open_is_kept() {
        let mut device = CpalDevice::new(0.5);
        device.set_volume(0.2).unwrap();
        assert_eq!(device.volume, 0.2);
    }

    #[test]
    fn test_unopened_device_is_not_suspended() {
        let mut device = CpalDevice::new(0.5);
        assert!(!device.is_suspended());
        assert!(device.suspend().is_ok());
        assert!(!device.is_suspended());
    }
}
