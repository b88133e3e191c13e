//! # Audio Capture Module
//!
//! Sources of audio frames for the pitch tap. Real-time microphone capture
//! goes through CPAL (Cross-Platform Audio Library). A synthetic tone source
//! drives the same pipeline without hardware.
//!
//! ## Features
//! - Default or named input device selection
//! - Closest supported sample rate, preferring mono f32 formats
//! - Downmixing of multi-channel input
//! - Fixed-size frames delivered over a channel without blocking the callback

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::f64::consts::TAU;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::CaptureConfig;

/// An input device as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDevice {
    pub name: String,
    pub is_default: bool,
}

/// Lists the input devices of the default host.
pub fn list_input_devices() -> Result<Vec<InputDevice>> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    for device in host.input_devices()? {
        let name = device.name()?;
        let is_default = default_name.as_deref() == Some(name.as_str());
        devices.push(InputDevice { name, is_default });
    }
    Ok(devices)
}

/// Starts audio capture and streams mono frames of `config.buffer_size`
/// samples to `sender`.
///
/// Frames are sent with `try_send`, so a full channel drops the frame
/// instead of stalling the audio callback.
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Audio stream handle and actual sample rate
/// * `Err(e)` - No usable device or format, or the stream failed to start
pub fn start_audio_capture(
    config: &CaptureConfig,
    sender: Sender<Vec<f32>>,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = select_input_device(&host, config.device.as_deref())?;

    log::info!("[capture] Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, config.sample_rate)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let sample_rate = config.sample_rate.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let supported_config = supported_config.with_sample_rate(cpal::SampleRate(sample_rate));
    let channels = usize::from(supported_config.channels());
    let stream_config: cpal::StreamConfig = supported_config.into();

    log::info!(
        "[capture] Selected {} Hz, {} channel(s), {} samples per frame",
        sample_rate,
        channels,
        config.buffer_size
    );

    let err_fn = |err| log::error!("[capture] An error occurred on the audio stream: {}", err);

    let mut framer = Framer::new(config.buffer_size, channels);

    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            framer.push(data, |frame| match sender.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => log::trace!("[capture] Analysis is behind, frame dropped"),
                Err(TrySendError::Disconnected(_)) => {
                    log::trace!("[capture] Frame receiver is gone")
                }
            });
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate))
}

fn select_input_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device> {
    let Some(wanted) = name else {
        return host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"));
    };

    for device in host.input_devices()? {
        if device.name().is_ok_and(|n| n == wanted) {
            return Ok(device);
        }
    }
    Err(anyhow!("Input device {wanted:?} not found"))
}

/// Picks the f32 input configuration closest to what the tuner wants.
///
/// Mono beats multi-channel; after that the configuration whose sample rate
/// range is closest to `target_rate` wins.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_rate = c.min_sample_rate().0;
            let max_rate = c.max_sample_rate().0;
            let rate_distance = if target_rate < min_rate {
                min_rate - target_rate
            } else {
                target_rate.saturating_sub(max_rate)
            };
            (c.channels() != 1, rate_distance)
        })
}

/// Accumulates interleaved input into mono frames of a fixed length.
#[derive(Debug)]
pub struct Framer {
    frame_len: usize,
    channels: usize,
    pending: Vec<f32>,
}

impl Framer {
    pub fn new(frame_len: usize, channels: usize) -> Self {
        Self {
            frame_len,
            channels: channels.max(1),
            pending: Vec::with_capacity(frame_len * 2),
        }
    }

    /// Appends interleaved samples and calls `emit` once for every complete
    /// frame. Channels are averaged into one.
    pub fn push(&mut self, interleaved: &[f32], mut emit: impl FnMut(Vec<f32>)) {
        if self.channels == 1 {
            self.pending.extend_from_slice(interleaved);
        } else {
            let channels = self.channels;
            self.pending.extend(
                interleaved
                    .chunks_exact(channels)
                    .map(|chunk| chunk.iter().sum::<f32>() / channels as f32),
            );
        }

        while self.pending.len() >= self.frame_len {
            let frame: Vec<f32> = self.pending.drain(..self.frame_len).collect();
            emit(frame);
        }
    }

    /// Samples waiting for the next frame.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// A sine generator that produces frames like a microphone would.
#[derive(Debug, Clone)]
pub struct ToneSource {
    frequency: f64,
    amplitude: f32,
    sample_rate: u32,
    frame_len: usize,
    phase: f64,
}

impl ToneSource {
    pub fn new(frequency: f64, amplitude: f32, sample_rate: u32, frame_len: usize) -> Self {
        Self {
            frequency,
            amplitude,
            sample_rate,
            frame_len,
            phase: 0.0,
        }
    }

    /// Real time covered by one frame.
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_len as f64 / f64::from(self.sample_rate))
    }

    /// The next frame. Phase carries over between frames.
    pub fn next_frame(&mut self) -> Vec<f32> {
        let step = TAU * self.frequency / f64::from(self.sample_rate);
        (0..self.frame_len)
            .map(|_| {
                let sample = self.amplitude * self.phase.sin() as f32;
                self.phase = (self.phase + step).rem_euclid(TAU);
                sample
            })
            .collect()
    }

    /// Sends one frame per frame duration to `sender` on a new thread, until
    /// `shutdown` fires or the receiver goes away.
    pub fn spawn(mut self, sender: Sender<Vec<f32>>, shutdown: Receiver<()>) -> JoinHandle<()> {
        thread::spawn(move || {
            log::info!(
                "[capture] Tone source started: {:.2} Hz at amplitude {}",
                self.frequency,
                self.amplitude
            );
            let pace = self.frame_duration();
            loop {
                crossbeam_channel::select! {
                    recv(shutdown) -> _ => break,
                    default(pace) => {
                        if let Err(TrySendError::Disconnected(_)) = sender.try_send(self.next_frame()) {
                            break;
                        }
                    }
                }
            }
            log::info!("[capture] Tone source stopped");
        })
    }
}
