use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NoteVerdict {
    Correct,
    Close,
    Wrong,
    Silent,
}

impl NoteVerdict {
    /// Right note, at least within the "close" band.
    pub fn is_pitch_correct(self) -> bool {
        matches!(self, NoteVerdict::Correct | NoteVerdict::Close)
    }
}

/// Outcome of comparing one pitch sample against one expected note.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ValidationResult {
    pub result: NoteVerdict,
    pub accuracy: u32,
    pub pitch_accuracy: u32,
    pub duration_accuracy: u32,
    pub pitch_match: bool,
    pub duration_match: bool,
    pub cents_off: i32,
    pub duration_held: f64,
    pub feedback: String,
}

impl ValidationResult {
    pub fn silent(feedback: impl Into<String>) -> Self {
        ValidationResult {
            result: NoteVerdict::Silent,
            accuracy: 0,
            pitch_accuracy: 0,
            duration_accuracy: 0,
            pitch_match: false,
            duration_match: false,
            cents_off: 0,
            duration_held: 0.0,
            feedback: feedback.into(),
        }
    }
}

/// A finalized, per-note verdict.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NoteResult {
    pub index: usize,
    /// Playback position when the note was finalized.
    pub timestamp: f64,
    #[serde(flatten)]
    pub validation: ValidationResult,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SessionStats {
    pub total_notes: u32,
    pub correct_notes: u32,
    pub close_notes: u32,
    pub wrong_notes: u32,
    pub silent_notes: u32,
    pub overall_accuracy: u32,
    pub pitch_accuracy: u32,
    pub duration_accuracy: u32,
}

impl SessionStats {
    pub fn counted_notes(&self) -> u32 {
        self.correct_notes + self.close_notes + self.wrong_notes + self.silent_notes
    }

    pub(crate) fn counter_mut(&mut self, verdict: NoteVerdict) -> &mut u32 {
        match verdict {
            NoteVerdict::Correct => &mut self.correct_notes,
            NoteVerdict::Close => &mut self.close_notes,
            NoteVerdict::Wrong => &mut self.wrong_notes,
            NoteVerdict::Silent => &mut self.silent_notes,
        }
    }
}
