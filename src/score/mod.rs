pub mod musicxml;
pub mod timeline;

use serde::{Deserialize, Serialize};

use crate::error::{CoachError, Result};
use crate::notes::midi_to_name;

/// A note as delivered by a score loader, in the source file's own time base.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RawNote {
    pub midi_number: i32,
    /// Note name with octave; derived from `midi_number` when empty.
    #[serde(default)]
    pub name: String,
    /// Onset in seconds.
    pub time: f64,
    /// Length in seconds.
    pub duration: f64,
    #[serde(default = "default_velocity")]
    pub velocity: f64,
}

pub(crate) fn default_velocity() -> f64 {
    0.8
}

impl RawNote {
    pub fn new(midi_number: i32, time: f64, duration: f64) -> Self {
        RawNote {
            midi_number,
            name: midi_to_name(midi_number),
            time,
            duration,
            velocity: default_velocity(),
        }
    }

    /// Rejects notes that would break the timeline invariants.
    pub fn check(&self) -> Result<()> {
        if !(0..=127).contains(&self.midi_number) {
            return Err(CoachError::InvalidNote(format!(
                "MIDI number {} out of range",
                self.midi_number
            )));
        }
        if !self.time.is_finite() || !self.duration.is_finite() {
            return Err(CoachError::InvalidNote(format!(
                "non-numeric timing for {}",
                self.display_name()
            )));
        }
        if self.duration <= 0.0 {
            return Err(CoachError::InvalidNote(format!(
                "{} has non-positive duration {}",
                self.display_name(),
                self.duration
            )));
        }
        Ok(())
    }

    fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            midi_to_name(self.midi_number)
        } else {
            self.name.trim().to_string()
        }
    }
}

/// One note of the normalized reference timeline.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExpectedNote {
    /// Note name with octave, e.g. `"C4"`.
    pub pitch: String,
    pub frequency: f64,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub velocity: f64,
    pub index: usize,
}

impl ExpectedNote {
    pub fn contains(&self, t: f64) -> bool {
        self.start_time <= t && t < self.end_time
    }
}
