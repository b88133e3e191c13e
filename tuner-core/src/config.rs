//! # Configuration
//!
//! Capture and detection settings, loaded from and saved to JSON.
//!
//! Only the audio plumbing is configurable. The musical reference (A4 =
//! 440 Hz), the amplitude gate and the in-tune tolerance are fixed constants
//! in [`tuning`](crate::tuning) and [`evaluator`](crate::evaluator).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{TunerError, TunerResult};

/// Complete tuner configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    pub capture: CaptureConfig,
    pub detection: DetectionConfig,
}

/// Audio input settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Input device name. `None` selects the host's default input.
    pub device: Option<String>,
    /// Requested sample rate in Hz. Clamped to what the device supports.
    pub sample_rate: u32,
    /// Samples per analysis frame. Larger frames resolve lower notes but
    /// add latency.
    pub buffer_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: 44_100,
            buffer_size: 2048,
        }
    }
}

/// Pitch tap settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Lowest fundamental reported, in Hz.
    pub min_frequency: f32,
    /// Highest fundamental reported, in Hz.
    pub max_frequency: f32,
    /// Maximum normalised YIN difference accepted as a clear pitch.
    pub clarity_threshold: f32,
    /// Refine the YIN estimate against the FFT magnitude spectrum.
    pub refine_with_spectrum: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_frequency: 50.0,
            max_frequency: 5000.0,
            clarity_threshold: 0.1,
            refine_with_spectrum: true,
        }
    }
}

impl TunerConfig {
    /// Loads and validates a configuration from a JSON file.
    ///
    /// Missing fields take their default values.
    pub fn load<P: AsRef<Path>>(path: P) -> TunerResult<Self> {
        let contents = fs::read_to_string(&path)?;
        let config: TunerConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        log::info!("[config] Loaded configuration from {:?}", path.as_ref());
        Ok(config)
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> TunerResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> TunerResult<()> {
        let capture = &self.capture;
        let detection = &self.detection;

        if capture.sample_rate < 8_000 {
            return Err(TunerError::InvalidConfig(format!(
                "sample_rate {} Hz is too low (minimum 8000)",
                capture.sample_rate
            )));
        }
        if capture.buffer_size < 256 {
            return Err(TunerError::InvalidConfig(format!(
                "buffer_size {} is too small (minimum 256)",
                capture.buffer_size
            )));
        }
        if !(detection.min_frequency > 0.0 && detection.min_frequency < detection.max_frequency) {
            return Err(TunerError::InvalidConfig(format!(
                "frequency range {}..{} Hz is empty or non-positive",
                detection.min_frequency, detection.max_frequency
            )));
        }
        let nyquist = capture.sample_rate as f32 / 2.0;
        if detection.max_frequency >= nyquist {
            return Err(TunerError::InvalidConfig(format!(
                "max_frequency {} Hz must be below Nyquist ({} Hz)",
                detection.max_frequency, nyquist
            )));
        }
        // YIN compares two half-frames, so one period has to fit in half a frame.
        let longest_period = capture.sample_rate as f32 / detection.min_frequency;
        if longest_period >= (capture.buffer_size / 2) as f32 {
            return Err(TunerError::InvalidConfig(format!(
                "buffer_size {} cannot resolve {} Hz at {} Hz (need more than {} samples)",
                capture.buffer_size,
                detection.min_frequency,
                capture.sample_rate,
                (longest_period * 2.0).ceil()
            )));
        }
        if !(detection.clarity_threshold > 0.0 && detection.clarity_threshold < 1.0) {
            return Err(TunerError::InvalidConfig(format!(
                "clarity_threshold {} must be between 0 and 1",
                detection.clarity_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("tuner-config-{}-{}", std::process::id(), name))
    }

    #[test]
    fn default_config_is_valid() {
        let config = TunerConfig::default();
        assert_eq!(config.capture.sample_rate, 44_100);
        assert_eq!(config.capture.buffer_size, 2048);
        assert_eq!(config.capture.device, None);
        assert!(config.detection.refine_with_spectrum);
        config.validate().unwrap();
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: TunerConfig =
            serde_json::from_str(r#"{ "capture": { "sample_rate": 48000 } }"#).unwrap();
        assert_eq!(config.capture.sample_rate, 48_000);
        assert_eq!(config.capture.buffer_size, 2048);
        assert_eq!(config.detection, DetectionConfig::default());
    }

    #[test]
    fn save_then_load() {
        let path = temp_path("save_then_load.json");
        let mut config = TunerConfig::default();
        config.capture.device = Some("USB Microphone".to_string());
        config.detection.max_frequency = 2000.0;

        config.save(&path).unwrap();
        let loaded = TunerConfig::load(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let path = temp_path("malformed.json");
        fs::write(&path, "{ not json").unwrap();
        let result = TunerConfig::load(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(TunerError::ConfigParse(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = TunerConfig::load(temp_path("does-not-exist.json"));
        assert!(matches!(result, Err(TunerError::ConfigIo(_))));
    }

    #[test]
    fn rejects_inconsistent_settings() {
        let mut config = TunerConfig::default();
        config.detection.max_frequency = 30_000.0;
        assert!(matches!(config.validate(), Err(TunerError::InvalidConfig(_))));

        let mut config = TunerConfig::default();
        config.detection.min_frequency = 10.0; // needs > 8820 samples at 44.1 kHz
        assert!(config.validate().is_err());

        let mut config = TunerConfig::default();
        config.detection.min_frequency = 600.0;
        config.detection.max_frequency = 500.0;
        assert!(config.validate().is_err());

        let mut config = TunerConfig::default();
        config.detection.clarity_threshold = 0.0;
        assert!(config.validate().is_err());
    }
}
