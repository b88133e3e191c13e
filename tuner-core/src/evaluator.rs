//! # Tuning Evaluator
//!
//! Turns raw `(frequency, amplitude)` samples from the pitch tap into a
//! display-ready [`TunerState`]: an amplitude noise gate, note classification
//! and a flat / in tune / sharp verdict.
//!
//! Every sample is evaluated on its own. There is no smoothing and no
//! hysteresis, and the previous state never influences the next one.

use serde::{Serialize, Serializer};

use crate::observable::{StatePublisher, StateReader, Subscription};
use crate::tuning::{self, NoteName};

/// Samples at or below this amplitude are treated as silence.
pub const AMPLITUDE_GATE: f64 = 0.1;

/// Deviations within ±this many cents (inclusive) count as in tune.
pub const IN_TUNE_TOLERANCE_CENTS: f32 = 5.0;

/// Shown in place of a note name when there is no usable signal (U+2212).
pub const IDLE_NOTE_SYMBOL: &str = "−";

/// One estimate from the pitch tap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchSample {
    /// Estimated fundamental in Hz. Zero or negative means no pitch was found.
    pub frequency: f64,
    /// Linear amplitude, unitless.
    pub amplitude: f64,
}

impl PitchSample {
    pub fn new(frequency: f64, amplitude: f64) -> Self {
        Self {
            frequency,
            amplitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TuningStatus {
    /// No valid pitch present.
    #[default]
    None,
    Flat,
    InTune,
    Sharp,
}

impl TuningStatus {
    /// Classifies a cents deviation against the in-tune tolerance.
    pub fn from_cents(cents: f32) -> Self {
        if cents < -IN_TUNE_TOLERANCE_CENTS {
            TuningStatus::Flat
        } else if cents > IN_TUNE_TOLERANCE_CENTS {
            TuningStatus::Sharp
        } else {
            TuningStatus::InTune
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TuningStatus::None => "",
            TuningStatus::Flat => "flat",
            TuningStatus::InTune => "in tune",
            TuningStatus::Sharp => "sharp",
        }
    }
}

/// Everything the presentation layer needs about the latest sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TunerState {
    /// Frequency of the latest sample, as reported by the pitch tap.
    pub pitch: f32,
    /// Amplitude of the latest sample, as reported by the pitch tap.
    pub amplitude: f32,
    /// `None` while idle.
    #[serde(serialize_with = "serialize_note")]
    pub current_note: Option<NoteName>,
    pub tuning_status: TuningStatus,
    pub cents_deviation: f32,
}

impl TunerState {
    pub const IDLE: TunerState = TunerState {
        pitch: 0.0,
        amplitude: 0.0,
        current_note: None,
        tuning_status: TuningStatus::None,
        cents_deviation: 0.0,
    };

    /// The note symbol, or the idle sentinel.
    pub fn note_label(&self) -> &'static str {
        self.current_note.map_or(IDLE_NOTE_SYMBOL, NoteName::symbol)
    }

    pub fn is_idle(&self) -> bool {
        self.current_note.is_none()
    }
}

impl Default for TunerState {
    fn default() -> Self {
        TunerState::IDLE
    }
}

fn serialize_note<S: Serializer>(note: &Option<NoteName>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(note.map_or(IDLE_NOTE_SYMBOL, NoteName::symbol))
}

/// Evaluates samples and publishes the result to an observable cell.
#[derive(Debug)]
pub struct TuningEvaluator {
    state: TunerState,
    publisher: StatePublisher,
}

impl Default for TuningEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl TuningEvaluator {
    pub fn new() -> Self {
        Self {
            state: TunerState::IDLE,
            publisher: StatePublisher::new(TunerState::IDLE),
        }
    }

    /// Evaluates a single sample without touching any state.
    ///
    /// Samples that fail the amplitude gate, or that carry no usable
    /// frequency, produce the idle result. `pitch` and `amplitude` always
    /// mirror the sample.
    pub fn evaluate(sample: PitchSample) -> TunerState {
        let idle = TunerState {
            pitch: sample.frequency as f32,
            amplitude: sample.amplitude as f32,
            ..TunerState::IDLE
        };

        // Written so that a NaN amplitude is gated out too.
        if !(sample.amplitude > AMPLITUDE_GATE) {
            return idle;
        }

        let Ok(classification) = tuning::classify(sample.frequency) else {
            return idle;
        };

        TunerState {
            current_note: Some(classification.note),
            tuning_status: TuningStatus::from_cents(classification.cents),
            cents_deviation: classification.cents,
            ..idle
        }
    }

    /// Evaluates `sample`, stores the result as the current state and
    /// notifies readers.
    pub fn process(&mut self, sample: PitchSample) -> TunerState {
        self.state = Self::evaluate(sample);
        self.publisher.publish(self.state);
        self.state
    }

    /// Returns to the idle state, e.g. when capture stops.
    pub fn reset(&mut self) {
        self.state = TunerState::IDLE;
        self.publisher.publish(self.state);
    }

    pub fn state(&self) -> TunerState {
        self.state
    }

    pub fn reader(&self) -> StateReader {
        self.publisher.reader()
    }

    pub fn subscribe(&mut self) -> Subscription {
        self.publisher.subscribe()
    }
}
