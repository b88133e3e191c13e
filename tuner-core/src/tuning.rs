//! # Musical Tuning Module
//!
//! Maps a frequency to the nearest note of 12-tone equal temperament and the
//! signed deviation from it in cents. The reference is fixed at A4 = 440 Hz.
//!
//! ## Features
//! - Frequency to (note name, cents) classification
//! - MIDI note number to note name and octave conversion
//! - Equal temperament reference frequencies
//!
//! Classification is pure arithmetic plus one table lookup, so it is safe to
//! call from a real-time audio callback.

use serde::Serialize;
use std::fmt;

use crate::error::{TunerError, TunerResult};

/// Reference pitch of A4 in Hz.
pub const A4_FREQUENCY: f64 = 440.0;

/// MIDI note number of A4.
pub const A4_MIDI: i32 = 69;

/// One of the twelve pitch classes of the chromatic scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NoteName {
    C,
    #[serde(rename = "C♯")]
    CSharp,
    D,
    #[serde(rename = "D♯")]
    DSharp,
    E,
    F,
    #[serde(rename = "F♯")]
    FSharp,
    G,
    #[serde(rename = "G♯")]
    GSharp,
    A,
    #[serde(rename = "A♯")]
    ASharp,
    B,
}

impl NoteName {
    /// The chromatic scale starting at C, indexed by pitch class.
    pub const ALL: [NoteName; 12] = [
        NoteName::C,
        NoteName::CSharp,
        NoteName::D,
        NoteName::DSharp,
        NoteName::E,
        NoteName::F,
        NoteName::FSharp,
        NoteName::G,
        NoteName::GSharp,
        NoteName::A,
        NoteName::ASharp,
        NoteName::B,
    ];

    /// Display symbol, using the musical sharp sign (U+266F).
    pub fn symbol(self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::CSharp => "C♯",
            NoteName::D => "D",
            NoteName::DSharp => "D♯",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::FSharp => "F♯",
            NoteName::G => "G",
            NoteName::GSharp => "G♯",
            NoteName::A => "A",
            NoteName::ASharp => "A♯",
            NoteName::B => "B",
        }
    }

    /// Pitch class, 0 for C through 11 for B.
    pub fn pitch_class(self) -> usize {
        self as usize
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// The nearest equal-tempered note to a frequency and how far off it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub note: NoteName,
    /// Scientific pitch octave (A4 = 4, middle C = C4).
    pub octave: i32,
    pub midi_note: i32,
    /// Signed deviation from `note` in cents. Positive is sharp.
    pub cents: f32,
}

/// Rounds to the nearest integer, resolving exact halves away from zero
/// (0.5 -> 1, -0.5 -> -1).
pub fn round_half_away_from_zero(value: f64) -> f64 {
    // f64::round rounds half-way cases away from zero on every platform.
    value.round()
}

/// Finds the nearest note to `frequency` and its deviation in cents.
///
/// # Arguments
/// * `frequency` - Input frequency in Hz, must be finite and > 0
///
/// # Returns
/// * `Ok(classification)` - Nearest note, octave, MIDI number and cents
/// * `Err(TunerError::InvalidFrequency)` - Non-positive or non-finite input
pub fn classify(frequency: f64) -> TunerResult<Classification> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return Err(TunerError::InvalidFrequency(frequency));
    }

    let half_steps_from_a4 = 12.0 * (frequency / A4_FREQUENCY).log2();
    let rounded_half_steps = round_half_away_from_zero(half_steps_from_a4);
    let cents = (100.0 * (half_steps_from_a4 - rounded_half_steps)) as f32;

    let midi_note = rounded_half_steps as i32 + A4_MIDI;
    let (note, octave) = midi_note_to_name(midi_note);

    Ok(Classification {
        note,
        octave,
        midi_note,
        cents,
    })
}

/// Converts a MIDI note number to its note name and octave.
///
/// Uses Euclidean division, so negative MIDI numbers (below C-1) still
/// resolve to the right pitch class.
pub fn midi_note_to_name(midi_note: i32) -> (NoteName, i32) {
    let note_index = midi_note.rem_euclid(12) as usize;
    let octave = midi_note.div_euclid(12) - 1;
    (NoteName::ALL[note_index], octave)
}

/// Equal temperament frequency of a MIDI note, in Hz.
pub fn note_frequency(midi_note: i32) -> f64 {
    A4_FREQUENCY * 2.0_f64.powf(f64::from(midi_note - A4_MIDI) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32, tolerance: f32) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} ± {tolerance}, got {actual}"
        );
    }

    #[test]
    fn a440_is_a_with_no_deviation() {
        let c = classify(440.0).unwrap();
        assert_eq!(c.note, NoteName::A);
        assert_eq!(c.cents, 0.0);
        assert_eq!(c.midi_note, 69);
        assert_eq!(c.octave, 4);
    }

    #[test]
    fn octaves_of_a440_are_exact() {
        for freq in [220.0, 880.0] {
            let c = classify(freq).unwrap();
            assert_eq!(c.note, NoteName::A);
            assert_eq!(c.cents, 0.0);
        }
    }

    #[test]
    fn reference_sharps_are_recognised() {
        let a_sharp = classify(466.16).unwrap();
        assert_eq!(a_sharp.note, NoteName::ASharp);
        assert_close(a_sharp.cents, 0.0, 0.1);

        let g_sharp = classify(415.30).unwrap();
        assert_eq!(g_sharp.note, NoteName::GSharp);
        assert_close(g_sharp.cents, 0.0, 0.1);
    }

    #[test]
    fn middle_c_is_c4() {
        let c = classify(261.63).unwrap();
        assert_eq!(c.note, NoteName::C);
        assert_eq!(c.octave, 4);
        assert_eq!(c.midi_note, 60);
    }

    #[test]
    fn note_name_is_octave_invariant() {
        for k in -8..=8 {
            let freq = 440.0 * 2.0_f64.powi(k);
            let c = classify(freq).unwrap();
            assert_eq!(c.note, NoteName::A, "k = {k}");
            assert_eq!(c.octave, 4 + k, "k = {k}");
        }
    }

    #[test]
    fn classification_is_deterministic() {
        for freq in [27.5, 103.83, 329.63, 440.0, 1234.5, 4186.01] {
            assert_eq!(classify(freq).unwrap(), classify(freq).unwrap());
        }
    }

    #[test]
    fn cents_stay_within_half_a_semitone() {
        let mut freq = 8.0;
        while freq < 12_000.0 {
            let cents = classify(freq).unwrap().cents;
            assert!(cents > -50.0 && cents <= 50.0, "{freq} Hz gave {cents} cents");
            freq *= 1.0007;
        }
    }

    #[test]
    fn two_octaves_and_a_semitone_below_a4_is_g_sharp() {
        let freq = 440.0 / 4.0 / 2.0_f64.powf(1.0 / 12.0);
        let c = classify(freq).unwrap();
        assert_eq!(c.note, NoteName::GSharp);
        assert_eq!(c.midi_note, 44);
        assert_close(c.cents, 0.0, 1e-3);
    }

    #[test]
    fn negative_midi_numbers_resolve_to_the_right_note() {
        // MIDI -4 is G#-2, roughly 6.49 Hz.
        let c = classify(note_frequency(-4)).unwrap();
        assert_eq!(c.midi_note, -4);
        assert_eq!(c.note, NoteName::GSharp);
        assert_eq!(c.octave, -2);

        assert_eq!(midi_note_to_name(-1), (NoteName::B, -2));
        assert_eq!(midi_note_to_name(-12), (NoteName::C, -2));
        assert_eq!(midi_note_to_name(0), (NoteName::C, -1));
    }

    #[test]
    fn ties_round_away_from_zero() {
        assert_eq!(round_half_away_from_zero(0.5), 1.0);
        assert_eq!(round_half_away_from_zero(-0.5), -1.0);
        assert_eq!(round_half_away_from_zero(2.5), 3.0);
        assert_eq!(round_half_away_from_zero(-2.5), -3.0);
        assert_eq!(round_half_away_from_zero(1.49), 1.0);
        assert_eq!(round_half_away_from_zero(-1.51), -2.0);
    }

    #[test]
    fn non_positive_frequencies_are_rejected() {
        for freq in [0.0, -440.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(classify(freq), Err(TunerError::InvalidFrequency(_))));
        }
    }

    #[test]
    fn note_frequency_matches_classification() {
        for midi in 21..=108 {
            let c = classify(note_frequency(midi)).unwrap();
            assert_eq!(c.midi_note, midi);
            assert_close(c.cents, 0.0, 1e-3);
        }
    }

    #[test]
    fn symbols_use_the_sharp_sign() {
        let symbols: Vec<&str> = NoteName::ALL.iter().map(|n| n.symbol()).collect();
        assert_eq!(
            symbols,
            ["C", "C♯", "D", "D♯", "E", "F", "F♯", "G", "G♯", "A", "A♯", "B"]
        );
        assert_eq!(NoteName::GSharp.to_string(), "G♯");
        assert_eq!(NoteName::A.pitch_class(), 9);
    }
}
