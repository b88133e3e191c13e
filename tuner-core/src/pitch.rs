//! # Pitch Detection Module
//!
//! Turns raw audio frames into [`PitchSample`]s for the tuning evaluator.
//!
//! ## Features
//! - YIN pitch detection with octave error prevention
//! - Noise rejection through a clarity check
//! - Parabolic interpolation for sub-sample accuracy
//! - Spectrum refinement for improved precision
//! - RMS amplitude per frame
//!
//! The tap never gates on amplitude itself. It always reports the frame's
//! amplitude and leaves the noise gate to the evaluator. When no clear pitch
//! is found the reported frequency is `0.0`.

use crate::config::DetectionConfig;
use crate::evaluator::PitchSample;
use crate::fft::SpectrumAnalyzer;

/// Extra headroom above the deepest YIN dip within which the first dip is
/// accepted. Picking the first dip rather than the deepest avoids reporting a
/// sub-octave.
const DIP_TOLERANCE: f32 = 0.05;

/// Estimates pitch and amplitude from fixed-size audio frames.
#[derive(Debug)]
pub struct PitchTap {
    sample_rate: u32,
    detection: DetectionConfig,
    spectrum: Option<SpectrumAnalyzer>,
}

impl PitchTap {
    /// Creates a tap for frames of `frame_len` samples at `sample_rate` Hz.
    pub fn new(sample_rate: u32, frame_len: usize, detection: &DetectionConfig) -> Self {
        let spectrum = detection
            .refine_with_spectrum
            .then(|| SpectrumAnalyzer::new(frame_len));

        Self {
            sample_rate,
            detection: detection.clone(),
            spectrum,
        }
    }

    /// Analyses one frame.
    pub fn analyze(&mut self, frame: &[f32]) -> PitchSample {
        let amplitude = rms(frame);
        let frequency = if amplitude > 0.0 {
            self.detect(frame).unwrap_or(0.0)
        } else {
            0.0
        };
        log::trace!("[pitch] frequency={frequency:.2} Hz amplitude={amplitude:.4}");
        PitchSample::new(f64::from(frequency), f64::from(amplitude))
    }

    fn detect(&mut self, frame: &[f32]) -> Option<f32> {
        let rough = detect_pitch_yin(
            frame,
            self.sample_rate,
            self.detection.min_frequency,
            self.detection.max_frequency,
            self.detection.clarity_threshold,
        )?;

        let frequency = match self.spectrum.as_mut() {
            Some(spectrum) => {
                let magnitudes = spectrum.magnitudes(frame);
                let bin_width = spectrum.bin_width(self.sample_rate);
                refine_from_spectrum(&magnitudes, rough, bin_width)
                    // A refinement that wanders off by more than a bin found
                    // a different peak.
                    .filter(|refined| (refined - rough).abs() <= bin_width)
                    .unwrap_or(rough)
            }
            None => rough,
        };

        (self.detection.min_frequency..=self.detection.max_frequency)
            .contains(&frequency)
            .then_some(frequency)
    }
}

/// Root mean square of a frame. Zero for an empty frame.
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|&s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}

/// YIN pitch detection restricted to `min_frequency..=max_frequency`.
///
/// # Arguments
/// * `signal` - Input audio frame
/// * `sample_rate` - Sample rate in Hz
/// * `min_frequency` / `max_frequency` - Search range in Hz
/// * `clarity_threshold` - Largest normalised difference accepted as a pitch
///
/// # Returns
/// * `Some(frequency)` - Detected frequency in Hz
/// * `None` - No clear pitch (silence, noise, or period out of range)
pub fn detect_pitch_yin(
    signal: &[f32],
    sample_rate: u32,
    min_frequency: f32,
    max_frequency: f32,
    clarity_threshold: f32,
) -> Option<f32> {
    let half = signal.len() / 2;
    let sample_rate_f = sample_rate as f32;
    let tau_min = ((sample_rate_f / max_frequency).floor() as usize).max(2);
    let tau_max = ((sample_rate_f / min_frequency).ceil() as usize).min(half.saturating_sub(2));
    if tau_min >= tau_max {
        return None;
    }

    // --- Difference function, one slot past tau_max for interpolation ---
    let mut yin_buffer = vec![0.0_f32; tau_max + 2];
    for tau in 1..yin_buffer.len() {
        yin_buffer[tau] = signal[..half]
            .iter()
            .zip(&signal[tau..tau + half])
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
    }

    // --- Cumulative mean normalized difference ---
    let mut running_sum = 0.0;
    yin_buffer[0] = 1.0;
    for tau in 1..yin_buffer.len() {
        running_sum += yin_buffer[tau];
        if running_sum != 0.0 {
            yin_buffer[tau] *= tau as f32 / running_sum;
        } else {
            yin_buffer[tau] = 1.0;
        }
    }

    // --- First dip close to the global minimum, then walk to its bottom ---
    let min_val = yin_buffer[tau_min..=tau_max]
        .iter()
        .copied()
        .fold(f32::INFINITY, f32::min);
    let threshold = min_val + DIP_TOLERANCE;

    let mut period = (tau_min..=tau_max).find(|&tau| yin_buffer[tau] < threshold)?;
    while period < tau_max && yin_buffer[period + 1] < yin_buffer[period] {
        period += 1;
    }

    // --- Clarity check to reject noise ---
    if yin_buffer[period] > clarity_threshold {
        return None;
    }

    // --- Parabolic interpolation for better precision ---
    let y1 = yin_buffer[period - 1];
    let y2 = yin_buffer[period];
    let y3 = yin_buffer[period + 1];
    let curvature = y1 - 2.0 * y2 + y3;
    let period_float = if curvature != 0.0 {
        period as f32 + (y1 - y3) / (2.0 * curvature)
    } else {
        period as f32
    };

    let frequency = sample_rate_f / period_float;
    (frequency.is_finite() && frequency > 0.0).then_some(frequency)
}

/// Refines a frequency estimate using a magnitude spectrum.
///
/// Looks for the strongest bin within two bins of `rough_freq` and
/// interpolates the peak on a log scale.
///
/// # Arguments
/// * `spectrum_magnitudes` - Magnitude spectrum up to Nyquist
/// * `rough_freq` - Initial frequency estimate in Hz
/// * `bin_width` - Width of one spectrum bin in Hz
///
/// # Returns
/// * `Some(refined_freq)` - Refined frequency estimate
/// * `None` - Refinement not possible, use the original estimate
pub fn refine_from_spectrum(
    spectrum_magnitudes: &[f32],
    rough_freq: f32,
    bin_width: f32,
) -> Option<f32> {
    if rough_freq <= 0.0 || bin_width <= 0.0 || spectrum_magnitudes.len() < 3 {
        return None;
    }
    let last_bin = spectrum_magnitudes.len() - 1;
    let target_bin = rough_freq / bin_width;
    let search_radius = 2.0;
    let start_bin = (target_bin - search_radius).max(1.0) as usize;
    let end_bin = ((target_bin + search_radius) as usize).min(last_bin - 1);
    if start_bin > end_bin {
        return None;
    }

    let (offset, _) = spectrum_magnitudes[start_bin..=end_bin]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    let peak_bin = start_bin + offset;

    let y1 = spectrum_magnitudes[peak_bin - 1].ln();
    let y2 = spectrum_magnitudes[peak_bin].ln();
    let y3 = spectrum_magnitudes[peak_bin + 1].ln();
    if !y1.is_finite() || !y2.is_finite() || !y3.is_finite() {
        return None;
    }

    let denominator = 2.0 * y2 - y1 - y3;
    if denominator.abs() < 1e-6 {
        return None;
    }

    let peak_shift = (y3 - y1) / (2.0 * denominator);
    let refined = (peak_bin as f32 + peak_shift) * bin_width;
    (refined.is_finite() && refined > 0.0).then_some(refined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const SAMPLE_RATE: u32 = 44_100;
    const FRAME: usize = 2048;

    fn sine(freq: f32, amplitude: f32) -> Vec<f32> {
        (0..FRAME)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32 + 0.3).sin())
            .collect()
    }

    fn cents_off(actual: f64, expected: f64) -> f64 {
        1200.0 * (actual / expected).log2()
    }

    fn tap(refine: bool) -> PitchTap {
        let detection = DetectionConfig {
            refine_with_spectrum: refine,
            ..DetectionConfig::default()
        };
        PitchTap::new(SAMPLE_RATE, FRAME, &detection)
    }

    #[test]
    fn rms_of_a_sine() {
        let amplitude = rms(&sine(440.0, 0.5));
        assert!((amplitude - 0.5 / 2.0_f32.sqrt()).abs() < 0.01);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn yin_finds_pure_tones() {
        for freq in [82.41_f32, 110.0, 196.0, 329.63, 440.0, 1318.5] {
            let detected = detect_pitch_yin(&sine(freq, 0.5), SAMPLE_RATE, 50.0, 5000.0, 0.1)
                .expect("pitch not detected");
            let off = cents_off(f64::from(detected), f64::from(freq));
            assert!(off.abs() < 2.0, "{freq} Hz detected as {detected} Hz");
        }
    }

    #[test]
    fn tap_reports_frequency_and_amplitude() {
        for refine in [false, true] {
            let mut tap = tap(refine);
            let sample = tap.analyze(&sine(440.0, 0.5));
            assert!(cents_off(sample.frequency, 440.0).abs() < 2.0, "{sample:?}");
            assert!((sample.amplitude - 0.3536).abs() < 0.01);
        }
    }

    #[test]
    fn harmonics_do_not_cause_octave_errors() {
        let fundamental = 110.0;
        let signal: Vec<f32> = (0..FRAME)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                (1..=6)
                    .map(|n| (2.0 * PI * fundamental * n as f32 * t).sin() / n as f32)
                    .sum::<f32>()
                    * 0.3
            })
            .collect();

        let sample = tap(true).analyze(&signal);
        assert!(cents_off(sample.frequency, 110.0).abs() < 5.0, "{sample:?}");
    }

    #[test]
    fn silence_has_no_pitch() {
        let sample = tap(true).analyze(&vec![0.0; FRAME]);
        assert_eq!(sample.frequency, 0.0);
        assert_eq!(sample.amplitude, 0.0);
    }

    #[test]
    fn noise_has_no_pitch() {
        // Deterministic white noise from a linear congruential generator.
        let mut seed: u32 = 0x1234_5678;
        let noise: Vec<f32> = (0..FRAME)
            .map(|_| {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (seed >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0
            })
            .collect();

        let sample = tap(true).analyze(&noise);
        assert_eq!(sample.frequency, 0.0);
        assert!(sample.amplitude > 0.1);
    }

    #[test]
    fn out_of_range_tones_are_ignored() {
        let detection = DetectionConfig {
            min_frequency: 200.0,
            max_frequency: 1000.0,
            ..DetectionConfig::default()
        };
        let mut tap = PitchTap::new(SAMPLE_RATE, FRAME, &detection);
        assert_eq!(tap.analyze(&sine(100.0, 0.5)).frequency, 0.0);
    }

    #[test]
    fn refinement_rejects_degenerate_input() {
        assert_eq!(refine_from_spectrum(&[1.0, 2.0, 1.0], 0.0, 10.0), None);
        assert_eq!(refine_from_spectrum(&[1.0, 2.0], 10.0, 10.0), None);
        assert_eq!(refine_from_spectrum(&[0.0; 16], 50.0, 10.0), None);
    }
}
