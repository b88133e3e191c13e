//! # Audio Worker
//!
//! Owns the capture source and the tuning evaluator on a dedicated thread.
//! Frames arrive from the capture callback over a bounded channel, each one
//! is analysed and evaluated, and the result is published to the
//! presentation side through a [`Subscription`].

use anyhow::{Result, anyhow};
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, Sender};
use std::thread::{self, JoinHandle};
use tuner_core::{
    Subscription, TunerConfig, TuningEvaluator,
    audio::{self, ToneSource},
    pitch::PitchTap,
};

/// Frames allowed to queue up between capture and analysis. Anything beyond
/// this is dropped by the capture side.
const FRAME_QUEUE: usize = 4;

/// Where the audio comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Microphone,
    Tone { frequency: f64, amplitude: f32 },
}

/// A running capture, kept alive until the worker stops.
enum Capture {
    Microphone(cpal::Stream),
    Tone {
        stop: Sender<()>,
        handle: JoinHandle<()>,
    },
}

impl Capture {
    fn start(config: &TunerConfig, source: &Source, frames: Sender<Vec<f32>>) -> Result<(Self, u32)> {
        match source {
            Source::Microphone => {
                let (stream, sample_rate) = audio::start_audio_capture(&config.capture, frames)?;
                Ok((Capture::Microphone(stream), sample_rate))
            }
            Source::Tone {
                frequency,
                amplitude,
            } => {
                let sample_rate = config.capture.sample_rate;
                let (stop, stop_rx) = crossbeam_channel::bounded(1);
                let handle = ToneSource::new(*frequency, *amplitude, sample_rate, config.capture.buffer_size)
                    .spawn(frames, stop_rx);
                Ok((Capture::Tone { stop, handle }, sample_rate))
            }
        }
    }

    fn stop(self) {
        match self {
            Capture::Microphone(stream) => {
                if let Err(e) = stream.pause() {
                    log::warn!("[worker] Error pausing stream: {}", e);
                }
                drop(stream);
            }
            Capture::Tone { stop, handle } => {
                let _ = stop.send(());
                if handle.join().is_err() {
                    log::error!("[worker] Tone source panicked");
                }
            }
        }
    }
}

/// Audio worker thread management structure.
///
/// Dropping the worker shuts the thread down and waits for it.
#[derive(Debug)]
pub struct AudioWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl AudioWorker {
    /// Starts capture and analysis on a new thread.
    ///
    /// Blocks until capture is running, so a missing microphone is reported
    /// here rather than only in the log.
    ///
    /// # Returns
    /// * `Ok((worker, subscription))` - Running worker and a handle onto its state
    /// * `Err(e)` - Capture could not be started
    pub fn start(config: &TunerConfig, source: Source) -> Result<(Self, Subscription)> {
        let mut evaluator = TuningEvaluator::new();
        let subscription = evaluator.subscribe();

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<u32>>(1);
        let config = config.clone();

        let thread_handle = thread::Builder::new()
            .name("audio-worker".into())
            .spawn(move || run(config, source, evaluator, shutdown_rx, ready_tx))?;

        let sample_rate = match ready_rx.recv() {
            Ok(ready) => ready,
            Err(_) => Err(anyhow!("Audio worker exited during startup")),
        };
        let sample_rate = match sample_rate {
            Ok(rate) => rate,
            Err(e) => {
                let _ = thread_handle.join();
                return Err(e);
            }
        };
        log::info!("[worker] Audio processing running at {} Hz", sample_rate);

        let worker = AudioWorker {
            shutdown_tx,
            thread_handle: Some(thread_handle),
        };
        Ok((worker, subscription))
    }

    /// Stops capture and waits for the thread to finish.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            log::info!("[worker] Shutting down audio worker...");
            let _ = self.shutdown_tx.send(());
            if handle.join().is_err() {
                log::error!("[worker] Audio thread panicked");
            }
        }
    }
}

impl Drop for AudioWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    config: TunerConfig,
    source: Source,
    mut evaluator: TuningEvaluator,
    shutdown_rx: Receiver<()>,
    ready_tx: Sender<Result<u32>>,
) {
    log::info!("[worker] Starting audio thread...");
    let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Vec<f32>>(FRAME_QUEUE);

    let (capture, sample_rate) = match Capture::start(&config, &source, frame_tx) {
        Ok(started) => started,
        Err(e) => {
            log::error!("[worker] Fatal error starting audio: {}", e);
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(sample_rate));

    let mut tap = PitchTap::new(sample_rate, config.capture.buffer_size, &config.detection);
    log::info!("[worker] Entering audio processing loop...");

    loop {
        crossbeam_channel::select! {
            recv(frame_rx) -> msg => match msg {
                Ok(frame) => {
                    evaluator.process(tap.analyze(&frame));
                }
                Err(_) => {
                    log::warn!("[worker] Audio channel closed");
                    break;
                }
            },
            recv(shutdown_rx) -> _ => {
                log::info!("[worker] Received shutdown signal");
                break;
            },
        }
    }

    evaluator.reset();
    capture.stop();
    log::info!("[worker] Audio thread finished");
}
