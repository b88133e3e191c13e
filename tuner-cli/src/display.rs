//! # Text Readout
//!
//! One-line rendering of the tuner state: note, cents, a cent meter with a
//! needle, and the verdict.
//!
//! ## Features
//! - Fixed-width output so successive lines overwrite cleanly
//! - Color-coded needle (green/yellow/red) on terminals

use tuner_core::TunerState;

/// Maximum cent deviation range for the meter display.
/// The meter shows deviations from -50 to +50 cents.
const METER_RANGE: f32 = 50.0;

/// Columns in the meter, odd so there is a centre column.
const METER_WIDTH: usize = 41;

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Accuracy zone of a deviation, used to color the needle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Good,
    Close,
    Off,
}

impl Zone {
    pub fn from_cents(cents: f32) -> Self {
        if cents.abs() < 5.0 {
            Zone::Good
        } else if cents.abs() < 20.0 {
            Zone::Close
        } else {
            Zone::Off
        }
    }

    fn color(self) -> &'static str {
        match self {
            Zone::Good => GREEN,
            Zone::Close => YELLOW,
            Zone::Off => RED,
        }
    }
}

/// Draws the meter. `None` draws an empty meter with only the centre mark.
pub fn render_meter(cents: Option<f32>, color: bool) -> String {
    let center = METER_WIDTH / 2;
    let needle = cents.map(|c| {
        let clamped = c.clamp(-METER_RANGE, METER_RANGE);
        let position = (clamped + METER_RANGE) / (2.0 * METER_RANGE) * (METER_WIDTH - 1) as f32;
        (position.round() as usize, Zone::from_cents(c))
    });

    let mut meter = String::with_capacity(METER_WIDTH + 16);
    meter.push('[');
    for column in 0..METER_WIDTH {
        match needle {
            Some((position, zone)) if position == column => {
                if color {
                    meter.push_str(zone.color());
                    meter.push('#');
                    meter.push_str(RESET);
                } else {
                    meter.push('#');
                }
            }
            _ if column == center => meter.push('|'),
            _ => meter.push('-'),
        }
    }
    meter.push(']');
    meter
}

/// Renders one full status line.
pub fn render_line(state: &TunerState, color: bool) -> String {
    if state.is_idle() {
        return format!("{:<2}  {:>7}  {}", state.note_label(), "", render_meter(None, color));
    }

    format!(
        "{:<2}  {:>+6.1}c  {}  {}",
        state.note_label(),
        state.cents_deviation,
        render_meter(Some(state.cents_deviation), color),
        state.tuning_status.label()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuner_core::{NoteName, TuningStatus};

    fn needle_column(meter: &str) -> Option<usize> {
        meter.chars().skip(1).position(|c| c == '#')
    }

    #[test]
    fn needle_tracks_cents() {
        assert_eq!(needle_column(&render_meter(Some(0.0), false)), Some(20));
        assert_eq!(needle_column(&render_meter(Some(-50.0), false)), Some(0));
        assert_eq!(needle_column(&render_meter(Some(50.0), false)), Some(40));
        assert_eq!(needle_column(&render_meter(Some(25.0), false)), Some(30));
    }

    #[test]
    fn needle_is_clamped() {
        assert_eq!(needle_column(&render_meter(Some(-80.0), false)), Some(0));
        assert_eq!(needle_column(&render_meter(Some(120.0), false)), Some(40));
    }

    #[test]
    fn empty_meter_shows_centre_only() {
        let meter = render_meter(None, false);
        assert_eq!(meter.chars().count(), METER_WIDTH + 2);
        assert_eq!(needle_column(&meter), None);
        assert_eq!(meter.chars().nth(21), Some('|'));
    }

    #[test]
    fn zones_follow_distance() {
        assert_eq!(Zone::from_cents(4.9), Zone::Good);
        assert_eq!(Zone::from_cents(-10.0), Zone::Close);
        assert_eq!(Zone::from_cents(35.0), Zone::Off);
    }

    #[test]
    fn colored_needle_is_wrapped_in_escape_codes() {
        let meter = render_meter(Some(30.0), true);
        assert!(meter.contains("\x1b[31m#\x1b[0m"));
    }

    #[test]
    fn renders_a_sharp_note() {
        let state = TunerState {
            pitch: 470.0,
            amplitude: 0.4,
            current_note: Some(NoteName::ASharp),
            tuning_status: TuningStatus::Sharp,
            cents_deviation: 12.34,
        };
        let line = render_line(&state, false);
        assert!(line.starts_with("A♯"));
        assert!(line.contains("+12.3c"));
        assert!(line.ends_with("sharp"));
    }

    #[test]
    fn renders_idle() {
        let line = render_line(&TunerState::IDLE, false);
        assert!(line.starts_with('−'));
        assert!(!line.contains('#'));
    }
}
