//! Workout session — a countdown that drives the metronome.
//!
//! The session is the metronome's only caller: it applies the tempo, starts
//! and stops clicking as the workout is started, paused or stopped, and stops
//! it for good when the countdown reaches zero.

use std::time::Duration;

use tracing::info;

use crate::audio::AudioDevice;
use crate::scheduler::Metronome;
use crate::tempo::TempoError;

/// Length and tempo of a workout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub duration_minutes: u32,
    pub bpm: f64,
}

impl SessionConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration_minutes) * 60)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_minutes: 30,
            bpm: 180.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkoutStatus {
    Idle,
    Running,
    Paused,
    Completed,
}

/// A timed workout paced by a [`Metronome`].
pub struct Workout<D: AudioDevice> {
    metronome: Metronome<D>,
    config: SessionConfig,
    status: WorkoutStatus,
    remaining: Duration,
}

impl<D: AudioDevice> Workout<D> {
    pub fn new(metronome: Metronome<D>, config: SessionConfig) -> Self {
        Self {
            metronome,
            remaining: config.duration(),
            config,
            status: WorkoutStatus::Idle,
        }
    }

    /// Start, or resume after a pause. A fresh start resets the countdown.
    pub fn start(&mut self) -> Result<(), TempoError> {
        match self.status {
            WorkoutStatus::Running => return Ok(()),
            WorkoutStatus::Idle | WorkoutStatus::Completed => {
                self.remaining = self.config.duration();
            }
            WorkoutStatus::Paused => {}
        }
        self.metronome.set_bpm(self.config.bpm)?;
        self.metronome.start();
        self.status = WorkoutStatus::Running;
        info!(
            bpm = self.config.bpm,
            remaining = %format_clock(self.remaining),
            "workout running"
        );
        Ok(())
    }

    /// Stop clicking but keep the remaining time.
    pub fn pause(&mut self) {
        if self.status != WorkoutStatus::Running {
            return;
        }
        self.metronome.stop();
        self.status = WorkoutStatus::Paused;
        info!(remaining = %format_clock(self.remaining), "workout paused");
    }

    /// Abandon the workout and reset the countdown.
    pub fn stop(&mut self) {
        self.metronome.stop();
        self.status = WorkoutStatus::Idle;
        self.remaining = self.config.duration();
    }

    /// Change the tempo now and for later resumes.
    pub fn set_bpm(&mut self, bpm: f64) -> Result<(), TempoError> {
        self.metronome.set_bpm(bpm)?;
        self.config.bpm = bpm;
        Ok(())
    }

    /// Count down by `elapsed` while running. Completes the workout at zero.
    pub fn advance(&mut self, elapsed: Duration) -> WorkoutStatus {
        if self.status != WorkoutStatus::Running {
            return self.status;
        }
        self.remaining = self.remaining.saturating_sub(elapsed);
        if self.remaining.is_zero() {
            self.metronome.stop();
            self.status = WorkoutStatus::Completed;
            info!("workout completed");
        }
        self.status
    }

    pub fn status(&self) -> WorkoutStatus {
        self.status
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Remaining time as `MM:SS`.
    pub fn format_remaining(&self) -> String {
        format_clock(self.remaining)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn metronome(&self) -> &Metronome<D> {
        &self.metronome
    }

    pub fn metronome_mut(&mut self) -> &mut Metronome<D> {
        &mut self.metronome
    }
}

/// Format whole seconds as `MM:SS`; minutes are not wrapped into hours.
pub fn format_clock(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ManualDevice;
    use crate::scheduler::RunState;

    fn workout(minutes: u32) -> Workout<ManualDevice> {
        let metronome = Metronome::with_defaults(ManualDevice::new());
        Workout::new(
            metronome,
            SessionConfig {
                duration_minutes: minutes,
                bpm: 170.0,
            },
        )
    }

    #[test]
    fn starts_idle_with_full_time() {
        let w = workout(30);
        assert_eq!(w.status(), WorkoutStatus::Idle);
        assert_eq!(w.format_remaining(), "30:00");
    }

    #[test]
    fn start_applies_tempo_and_runs_metronome() {
        let mut w = workout(30);
        w.start().unwrap();
        assert_eq!(w.status(), WorkoutStatus::Running);
        assert_eq!(w.metronome().state(), RunState::Running);
        assert_eq!(w.metronome().bpm(), 170.0);
        w.stop();
    }

    #[test]
    fn pause_keeps_remaining_time() {
        let mut w = workout(1);
        w.start().unwrap();
        w.advance(Duration::from_secs(20));
        w.pause();
        assert_eq!(w.status(), WorkoutStatus::Paused);
        assert_eq!(w.metronome().state(), RunState::Stopped);
        assert_eq!(w.format_remaining(), "00:40");

        // Time does not pass while paused.
        w.advance(Duration::from_secs(10));
        assert_eq!(w.format_remaining(), "00:40");

        w.start().unwrap();
        assert_eq!(w.format_remaining(), "00:40");
        assert_eq!(w.metronome().state(), RunState::Running);
        w.stop();
    }

    #[test]
    fn stop_resets_countdown() {
        let mut w = workout(2);
        w.start().unwrap();
        w.advance(Duration::from_secs(30));
        w.stop();
        assert_eq!(w.status(), WorkoutStatus::Idle);
        assert_eq!(w.format_remaining(), "02:00");
        assert_eq!(w.metronome().state(), RunState::Stopped);
    }

    #[test]
    fn countdown_completes_and_stops_metronome() {
        let mut w = workout(1);
        w.start().unwrap();
        assert_eq!(w.advance(Duration::from_secs(59)), WorkoutStatus::Running);
        assert_eq!(w.advance(Duration::from_secs(5)), WorkoutStatus::Completed);
        assert_eq!(w.remaining(), Duration::ZERO);
        assert_eq!(w.metronome().state(), RunState::Stopped);
    }

    #[test]
    fn restart_after_completion_resets_time() {
        let mut w = workout(1);
        w.start().unwrap();
        w.advance(Duration::from_secs(60));
        w.start().unwrap();
        assert_eq!(w.format_remaining(), "01:00");
        w.stop();
    }

    #[test]
    fn set_bpm_updates_live_tempo() {
        let mut w = workout(5);
        w.start().unwrap();
        w.set_bpm(190.0).unwrap();
        assert_eq!(w.metronome().bpm(), 190.0);
        assert!(w.set_bpm(0.0).is_err());
        assert_eq!(w.config().bpm, 190.0);
        w.stop();
    }

    #[test]
    fn volume_changes_while_running() {
        let mut w = workout(5);
        w.start().unwrap();
        w.metronome_mut().set_volume(0.25).unwrap();
        assert_eq!(w.metronome().device().volume(), 0.25);
        assert_eq!(w.status(), WorkoutStatus::Running);
        w.stop();
    }

    #[test]
    fn invalid_session_tempo_fails_start() {
        let metronome = Metronome::with_defaults(ManualDevice::new());
        let mut w = Workout::new(
            metronome,
            SessionConfig {
                duration_minutes: 1,
                bpm: -1.0,
            },
        );
        assert!(w.start().is_err());
        assert_eq!(w.status(), WorkoutStatus::Idle);
    }

    #[test]
    fn format_clock_pads() {
        assert_eq!(format_clock(Duration::from_secs(0)), "00:00");
        assert_eq!(format_clock(Duration::from_secs(65)), "01:05");
        assert_eq!(format_clock(Duration::from_secs(90 * 60)), "90:00");
    }
}
