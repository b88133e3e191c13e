// tuner-core/src/lib.rs

//! The core logic for the instrument tuner.
//! This crate turns audio into a note name, a cents deviation and a
//! flat / in tune / sharp verdict. It is completely headless
//! and contains no presentation code.
//!
//! The pipeline, one step per module:
//! - [`audio`] delivers fixed-size frames (microphone or synthetic tone)
//! - [`pitch`] estimates `(frequency, amplitude)` per frame
//! - [`evaluator`] gates on amplitude, classifies and derives the status
//! - [`observable`] publishes the latest state to any number of readers

pub mod audio;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod fft;
pub mod observable;
pub mod pitch;
pub mod tuning;

pub use config::{CaptureConfig, DetectionConfig, TunerConfig};
pub use error::{TunerError, TunerResult};
pub use evaluator::{PitchSample, TunerState, TuningEvaluator, TuningStatus};
pub use observable::{StateReader, Subscription};
pub use tuning::{Classification, NoteName, classify};
