//! # Tala - Real-time Instrument Tuner
//!
//! Command-line front end for `tuner-core`. Listens to the microphone (or a
//! synthetic tone), and prints the nearest note, its deviation in cents and
//! whether it is flat, in tune or sharp.
//!
//! ## Architecture
//! - **Main Thread**: argument parsing and the text readout
//! - **Audio Thread**: capture, pitch estimation and tuning evaluation
//! - **Communication**: crossbeam channels and an observable state cell

mod display;
mod worker;

use anyhow::{Result, bail};
use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tuner_core::{TunerConfig, audio};
use worker::{AudioWorker, Source};

/// How long the readout waits for a new state before checking the deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Parser)]
#[command(name = "tala", version, about = "Real-time instrument tuner")]
struct Args {
    /// JSON configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Input device name (see --list-devices)
    #[arg(short, long)]
    device: Option<String>,

    /// Tune a synthetic sine at this frequency instead of the microphone
    #[arg(long, value_name = "HZ")]
    tone: Option<f64>,

    /// Peak amplitude of the synthetic tone
    #[arg(long, value_name = "AMP", default_value_t = 0.5)]
    tone_amplitude: f32,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    duration: Option<f64>,

    /// Print one JSON object per state change instead of the meter
    #[arg(long)]
    json: bool,

    /// List input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if args.list_devices {
        for device in audio::list_input_devices()? {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("{}{}", device.name, marker);
        }
        return Ok(());
    }

    let config = load_config(&args)?;

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let source = match args.tone {
        Some(frequency) if !(frequency > 0.0 && frequency.is_finite()) => {
            bail!("--tone must be a positive frequency, got {frequency}")
        }
        Some(frequency) => Source::Tone {
            frequency,
            amplitude: args.tone_amplitude,
        },
        None => Source::Microphone,
    };

    log::info!("[main] Starting tuner...");
    let (mut worker, subscription) = AudioWorker::start(&config, source)?;

    let deadline = args
        .duration
        .filter(|secs| secs.is_finite())
        .map(|secs| Instant::now() + Duration::from_secs_f64(secs.max(0.0)));
    let color = std::io::stdout().is_terminal();
    let mut stdout = std::io::stdout().lock();
    let mut last_line = String::new();

    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }

        let state = match subscription.recv_timeout(POLL_INTERVAL) {
            Ok(state) => state,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("[main] Audio worker stopped");
                break;
            }
        };

        let line = if args.json {
            serde_json::to_string(&state)?
        } else {
            display::render_line(&state, color)
        };
        if line == last_line {
            continue;
        }

        if args.json {
            writeln!(stdout, "{}", line)?;
        } else {
            write!(stdout, "\r{}\x1b[K", line)?;
            stdout.flush()?;
        }
        last_line = line;
    }

    if !args.json {
        writeln!(stdout)?;
    }
    worker.shutdown();
    log::info!("[main] Tuner stopped");
    Ok(())
}

/// Loads the configuration file, if any, and applies command-line overrides.
fn load_config(args: &Args) -> Result<TunerConfig> {
    let mut config = match &args.config {
        Some(path) => TunerConfig::load(path)?,
        None => TunerConfig::default(),
    };
    if let Some(device) = &args.device {
        config.capture.device = Some(device.clone());
    }
    config.validate()?;
    Ok(config)
}
