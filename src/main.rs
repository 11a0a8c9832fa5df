//! Stride — paces a jog with a click at a fixed cadence.
//!
//! Runs a timed workout: prints the countdown, clicks at the configured tempo
//! and accepts live commands on stdin (a number changes the tempo, `v 0.5`
//! sets the volume, `p` pauses or resumes, `q` quits). Ctrl-C stops cleanly.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_channel::{unbounded, Receiver};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use stride::audio::{AudioDevice, CpalDevice, NullDevice};
use stride::config::{check_volume, StrideConfig};
use stride::scheduler::Metronome;
use stride::session::{Workout, WorkoutStatus};
use stride::tone::AudioMode;

/// How often the countdown and stdin commands are checked.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Parser)]
#[command(name = "stride", version, about = "Cadence metronome for slow jogging")]
struct Cli {
    /// Tempo in beats per minute.
    #[arg(long)]
    bpm: Option<f64>,

    /// Workout length in minutes.
    #[arg(long)]
    minutes: Option<u32>,

    /// Config file to use instead of ~/.stride/config.yaml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output volume (0.0-1.0).
    #[arg(long)]
    volume: Option<f32>,

    /// Keep time without opening an audio device.
    #[arg(long)]
    silent: bool,
}

/// A command typed on stdin.
#[derive(Debug, PartialEq)]
enum Input {
    Tempo(f64),
    Volume(f32),
    TogglePause,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    if let Some(volume) = line
        .strip_prefix("volume ")
        .or_else(|| line.strip_prefix("v "))
    {
        return volume.trim().parse::<f32>().ok().map(Input::Volume);
    }
    match line {
        "p" | "pause" => Some(Input::TogglePause),
        "q" | "quit" => Some(Input::Quit),
        other => other.parse::<f64>().ok().map(Input::Tempo),
    }
}

fn spawn_stdin_reader() -> Receiver<Input> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match parse_input(&line) {
                Some(input) => {
                    if tx.send(input).is_err() {
                        break;
                    }
                }
                None => warn!(input = line.trim(), "unrecognised command"),
            }
        }
    });
    rx
}

fn load_config(cli: &Cli) -> StrideConfig {
    let mut config = match &cli.config {
        Some(path) => StrideConfig::load_from(path).unwrap_or_else(|e| {
            eprintln!("stride: {}: {e}", path.display());
            std::process::exit(2);
        }),
        None => StrideConfig::load(),
    };
    if let Some(bpm) = cli.bpm {
        config.bpm = bpm;
    }
    if let Some(minutes) = cli.minutes {
        config.duration_minutes = minutes;
    }
    if let Some(volume) = cli.volume {
        config.volume = volume.clamp(0.0, 1.0);
    }
    if let Err(e) = config.validate() {
        eprintln!("stride: {e}");
        std::process::exit(2);
    }
    config
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli);

    let device: Box<dyn AudioDevice> = if cli.silent {
        Box::new(NullDevice)
    } else {
        Box::new(CpalDevice::new(config.volume))
    };
    let metronome = Metronome::new(device, config.scheduler, config.click.to_tone());
    let mut workout = Workout::new(metronome, config.session());

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!(error = %e, "ctrl-c handler not installed");
    }
    let input = spawn_stdin_reader();

    println!(
        "stride v{} — {} BPM for {} min (type a tempo, `v <0-1>` for volume, `p` to pause, `q` to quit)",
        env!("CARGO_PKG_VERSION"),
        config.bpm,
        config.duration_minutes
    );

    if let Err(e) = workout.start() {
        error!(error = %e, "cannot start workout");
        std::process::exit(1);
    }
    if workout.metronome().audio_mode() == AudioMode::Silent {
        println!("no audio output, keeping time silently");
    }

    let mut last_tick = Instant::now();
    let mut shown = String::new();
    'session: loop {
        thread::sleep(POLL_INTERVAL);
        if interrupted.load(Ordering::SeqCst) {
            break;
        }

        while let Ok(command) = input.try_recv() {
            match command {
                Input::Tempo(bpm) => match config.check_bpm(bpm) {
                    Ok(bpm) => match workout.set_bpm(bpm) {
                        Ok(()) => info!(bpm, "tempo set"),
                        Err(e) => warn!(error = %e, "tempo rejected"),
                    },
                    Err(e) => warn!(error = %e, "tempo rejected"),
                },
                Input::Volume(volume) => match check_volume(volume) {
                    Ok(volume) => match workout.metronome_mut().set_volume(volume) {
                        Ok(()) => info!(volume, "volume set"),
                        Err(e) => warn!(error = %e, "volume not applied"),
                    },
                    Err(e) => warn!(error = %e, "volume rejected"),
                },
                Input::TogglePause => {
                    if workout.status() == WorkoutStatus::Running {
                        workout.pause();
                    } else if let Err(e) = workout.start() {
                        warn!(error = %e, "cannot resume");
                    }
                }
                Input::Quit => break 'session,
            }
        }

        let now = Instant::now();
        let status = workout.advance(now - last_tick);
        last_tick = now;

        let line = format!(
            "{}  {:.0} BPM{}",
            workout.format_remaining(),
            workout.metronome().bpm(),
            if status == WorkoutStatus::Paused {
                "  (paused)"
            } else {
                ""
            }
        );
        if line != shown {
            print!("\r{line}   ");
            let _ = io::stdout().flush();
            shown = line;
        }

        if status == WorkoutStatus::Completed {
            println!("\nworkout complete");
            break;
        }
    }

    workout.stop();
    println!();
}
