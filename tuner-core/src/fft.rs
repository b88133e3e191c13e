//! # Fast Fourier Transform (FFT) Module
//!
//! Magnitude spectra for refining pitch estimates.
//!
//! ## Features
//! - One planned RustFFT transform per frame length, reused across frames
//! - DC offset removal and Hann windowing before the transform
//! - Zero padding for finer bin spacing

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::fmt;
use std::sync::Arc;

/// Transform length relative to the frame length. Padding narrows the bin
/// spacing, which keeps the bias of the peak interpolation well under a cent.
pub const ZERO_PAD_FACTOR: usize = 4;

/// Computes magnitude spectra of fixed-length frames.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    frame_len: usize,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("frame_len", &self.frame_len)
            .field("fft_len", &self.fft_len())
            .finish()
    }
}

impl SpectrumAnalyzer {
    pub fn new(frame_len: usize) -> Self {
        let fft_len = frame_len * ZERO_PAD_FACTOR;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_len);

        Self {
            fft,
            frame_len,
            window: hann_window(frame_len),
            buffer: vec![Complex { re: 0.0, im: 0.0 }; fft_len],
        }
    }

    /// Length of the (zero padded) transform.
    pub fn fft_len(&self) -> usize {
        self.buffer.len()
    }

    /// Width of one bin of [`magnitudes`](Self::magnitudes) in Hz.
    pub fn bin_width(&self, sample_rate: u32) -> f32 {
        sample_rate as f32 / self.fft_len() as f32
    }

    /// Returns the magnitude spectrum of `signal` up to the Nyquist frequency.
    ///
    /// The signal is mean-centred, Hann windowed and zero padded. Frames
    /// shorter than `frame_len` are padded with silence, longer ones are cut.
    pub fn magnitudes(&mut self, signal: &[f32]) -> Vec<f32> {
        let used = signal.len().min(self.frame_len);
        let mean = if used == 0 {
            0.0
        } else {
            signal[..used].iter().sum::<f32>() / used as f32
        };

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i < used {
                (signal[i] - mean) * self.window[i]
            } else {
                0.0
            };
            *slot = Complex { re: sample, im: 0.0 };
        }

        self.fft.process(&mut self.buffer);

        self.buffer
            .iter()
            .take(self.fft_len() / 2)
            .map(|c| c.norm()) // .norm() is sqrt(re^2 + im^2)
            .collect()
    }
}

/// Hann window coefficients, tapering to zero at both ends.
fn hann_window(len: usize) -> Vec<f32> {
    if len < 2 {
        return vec![1.0; len];
    }
    let n_minus_1 = (len - 1) as f32;
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
        .collect()
}
