//! Beat scheduling engine — the metronome.
//!
//! A [`Metronome`] owns the tempo, the audio device and at most one driver
//! thread. While running, the driver wakes every few tens of milliseconds and
//! runs a [`Lookahead`] pass against the audio output's clock; every beat that
//! falls inside the horizon is handed to the [`ToneEmitter`], which schedules
//! it on the output at its exact time.
//!
//! The engine never fails its caller because of audio trouble. If the device
//! cannot be opened or resumed, the run continues in [`AudioMode::Silent`]
//! against a wall-clock fallback, and the next start tries the device again.

pub mod driver;
pub mod lookahead;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

pub use driver::{Driver, DriverTask};
pub use lookahead::Lookahead;

use crate::audio::{AudioDevice, AudioError, AudioOutput, SilentOutput};
use crate::config::SchedulerConfig;
use crate::tempo::{Tempo, TempoError};
use crate::tone::{AudioMode, ClickTone, ToneEmitter};

/// Whether the driver loop is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
}

/// What a finished run did, returned when the metronome stops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Beats the lookahead produced.
    pub beats: u64,
    /// Clicks the output accepted.
    pub clicks: u64,
    /// Clicks the output refused.
    pub dropped: u64,
    /// Cursor position when the run ended.
    pub next_beat_time: f64,
    pub wakes: u64,
    pub mode: AudioMode,
}

/// State moved onto the driver thread for one run.
struct BeatRun {
    lookahead: Lookahead,
    tempo: Arc<Tempo>,
    emitter: ToneEmitter,
    wakes: Arc<AtomicU64>,
    stalled: bool,
}

impl BeatRun {
    fn summary(&self) -> RunSummary {
        RunSummary {
            beats: self.lookahead.emitted(),
            clicks: self.emitter.scheduled(),
            dropped: self.emitter.dropped(),
            next_beat_time: self.lookahead.next_beat_time(),
            wakes: self.wakes.load(Ordering::Relaxed),
            mode: self.emitter.mode(),
        }
    }
}

impl DriverTask for BeatRun {
    fn on_wake(&mut self) {
        self.wakes.fetch_add(1, Ordering::Relaxed);
        let now = self.emitter.current_time();
        let emitter = &mut self.emitter;
        match self.lookahead.fill(now, &self.tempo, |event| emitter.emit(&event)) {
            Ok(0) => {}
            Ok(count) => {
                self.stalled = false;
                debug!(count, now, next = self.lookahead.next_beat_time(), "beats scheduled");
            }
            Err(e) => {
                if !self.stalled {
                    error!(error = %e, "beat cursor cannot advance, scheduling halted");
                }
                self.stalled = true;
            }
        }
    }
}

/// Lookahead metronome driving clicks on an [`AudioDevice`].
pub struct Metronome<D: AudioDevice> {
    tempo: Arc<Tempo>,
    device: D,
    live: Option<Arc<dyn AudioOutput>>,
    fallback: Arc<SilentOutput>,
    mode: AudioMode,
    config: SchedulerConfig,
    tone: ClickTone,
    driver: Option<Driver<BeatRun>>,
    wakes: Arc<AtomicU64>,
    last_run: Option<RunSummary>,
}

impl<D: AudioDevice> Metronome<D> {
    /// A stopped metronome at the default tempo. The device is not touched until `start`.
    pub fn new(device: D, config: SchedulerConfig, tone: ClickTone) -> Self {
        Self {
            tempo: Arc::new(Tempo::default()),
            device,
            live: None,
            fallback: Arc::new(SilentOutput::new()),
            mode: AudioMode::Silent,
            config,
            tone,
            driver: None,
            wakes: Arc::new(AtomicU64::new(0)),
            last_run: None,
        }
    }

    /// Default scheduling constants and click.
    pub fn with_defaults(device: D) -> Self {
        Self::new(device, SchedulerConfig::default(), ClickTone::default())
    }

    /// Change the tempo. Applies to every beat computed after the call.
    pub fn set_bpm(&self, bpm: f64) -> Result<(), TempoError> {
        self.tempo.set_bpm(bpm)?;
        debug!(bpm, "tempo changed");
        Ok(())
    }

    pub fn bpm(&self) -> f64 {
        self.tempo.bpm()
    }

    /// Set the output volume (0.0-1.0). Applies to clicks already scheduled.
    pub fn set_volume(&mut self, volume: f32) -> Result<(), AudioError> {
        self.device.set_volume(volume)?;
        debug!(volume, "volume changed");
        Ok(())
    }

    /// Begin clicking. Does nothing if already running.
    pub fn start(&mut self) {
        if self.driver.is_some() {
            return;
        }

        let (output, mode) = match self.acquire_output() {
            Ok(output) => (output, AudioMode::Live),
            Err(e) => {
                warn!(error = %e, "audio unavailable, running silent");
                let fallback: Arc<dyn AudioOutput> = self.fallback.clone();
                (fallback, AudioMode::Silent)
            }
        };
        let now = output.current_time();
        let lookahead = Lookahead::new(
            now,
            self.config.lead_secs(),
            self.config.horizon_secs(),
            self.tone,
        );
        let wakes = Arc::new(AtomicU64::new(0));
        let run = BeatRun {
            lookahead,
            tempo: Arc::clone(&self.tempo),
            emitter: ToneEmitter::new(output, mode),
            wakes: Arc::clone(&wakes),
            stalled: false,
        };

        match Driver::spawn(self.config.wake_interval(), run) {
            Ok(driver) => {
                info!(bpm = self.tempo.bpm(), ?mode, start = now, "metronome started");
                self.mode = mode;
                self.wakes = wakes;
                self.driver = Some(driver);
            }
            Err(e) => error!(error = %e, "failed to spawn driver thread"),
        }
    }

    /// Stop clicking. Clicks already handed to the output still play out.
    pub fn stop(&mut self) {
        let Some(driver) = self.driver.take() else {
            return;
        };
        match driver.stop() {
            Some(run) => {
                let summary = run.summary();
                info!(beats = summary.beats, dropped = summary.dropped, "metronome stopped");
                self.last_run = Some(summary);
            }
            None => error!("driver thread panicked"),
        }
    }

    pub fn state(&self) -> RunState {
        if self.driver.is_some() {
            RunState::Running
        } else {
            RunState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Audio mode of the current, or most recent, run.
    pub fn audio_mode(&self) -> AudioMode {
        self.mode
    }

    /// Driver wakes in the current, or most recent, run.
    pub fn wakes(&self) -> u64 {
        self.wakes.load(Ordering::Relaxed)
    }

    /// Summary of the last completed run.
    pub fn last_run(&self) -> Option<RunSummary> {
        self.last_run
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Open the device once, then resume it whenever it reports suspended.
    fn acquire_output(&mut self) -> Result<Arc<dyn AudioOutput>, AudioError> {
        let output = match &self.live {
            Some(output) => Arc::clone(output),
            None => {
                let output = self.device.open()?;
                self.live = Some(Arc::clone(&output));
                output
            }
        };
        if self.device.is_suspended() {
            debug!("audio output suspended, resuming");
            self.device.resume()?;
        }
        Ok(output)
    }
}

impl<D: AudioDevice> Drop for Metronome<D> {
    fn drop(&mut self) {
        self.stop();
    }
}
