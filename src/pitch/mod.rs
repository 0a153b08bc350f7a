pub mod yin;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::notes::{frequency_to_midi, round_half_up, NOTE_NAMES};

/// One detected-pitch observation, produced once per animation frame.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PitchSample {
    /// Note name without octave, e.g. `"C#"`.
    pub note: String,
    pub octave: i32,
    pub frequency: f64,
    /// Signed offset from the nearest equal-tempered pitch.
    pub cents: i32,
    pub is_detecting: bool,
    /// 0..=1
    pub audio_level: f64,
}

impl PitchSample {
    pub fn silence() -> Self {
        PitchSample {
            note: String::new(),
            octave: 0,
            frequency: 0.0,
            cents: 0,
            is_detecting: false,
            audio_level: 0.0,
        }
    }

    /// Sample for a stable tone at `hz`, snapped to the nearest note.
    /// Non-positive or non-finite frequencies give [`PitchSample::silence`].
    pub fn from_frequency(hz: f64, audio_level: f64) -> Self {
        let Some(midi_float) = frequency_to_midi(hz) else {
            return PitchSample::silence();
        };
        let nearest = round_half_up(midi_float);
        let midi = nearest as i32;
        PitchSample {
            note: NOTE_NAMES[midi.rem_euclid(12) as usize].to_string(),
            octave: midi.div_euclid(12) - 1,
            frequency: hz,
            cents: round_half_up((midi_float - nearest) * 100.0) as i32,
            is_detecting: true,
            audio_level: audio_level.clamp(0.0, 1.0),
        }
    }
}

impl Default for PitchSample {
    fn default() -> Self {
        PitchSample::silence()
    }
}

/// A continuously updated pitch reading, polled once per tick.
pub trait PitchSource {
    /// Acquires the underlying input (e.g. the microphone).
    fn start(&mut self) -> Result<()>;
    /// Releases the input. Must be safe to call more than once.
    fn stop(&mut self);
    fn is_running(&self) -> bool;
    /// Latest reading; silence when stopped.
    fn current_sample(&self) -> PitchSample;
}
