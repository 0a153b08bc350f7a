//! Finalized note results and the statistics folded over them.

use serde::Serialize;
use tracing::debug;

use crate::error::{CoachError, Result};
use crate::notes::round_half_up;
use crate::scoring::types::{NoteResult, SessionStats, ValidationResult};

/// Integer sums behind the three means; summing integers keeps the running
/// mean bit-identical to a full recomputation.
#[derive(Clone, Debug, Default, PartialEq)]
struct AccuracySums {
    overall: u64,
    pitch: u64,
    duration: u64,
}

impl AccuracySums {
    fn add(&mut self, v: &ValidationResult) {
        self.overall += v.accuracy as u64;
        self.pitch += v.pitch_accuracy as u64;
        self.duration += v.duration_accuracy as u64;
    }

    fn remove(&mut self, v: &ValidationResult) {
        self.overall -= v.accuracy as u64;
        self.pitch -= v.pitch_accuracy as u64;
        self.duration -= v.duration_accuracy as u64;
    }
}

/// Append-only history of finalized notes, at most one per note index.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct NoteResultLog {
    note_results: Vec<NoteResult>,
    session_stats: SessionStats,
    #[serde(skip)]
    sums: AccuracySums,
}

impl NoteResultLog {
    pub fn new(total_notes: u32) -> Self {
        NoteResultLog {
            session_stats: SessionStats {
                total_notes,
                ..SessionStats::default()
            },
            ..NoteResultLog::default()
        }
    }

    pub fn note_results(&self) -> &[NoteResult] {
        &self.note_results
    }

    pub fn stats(&self) -> &SessionStats {
        &self.session_stats
    }

    pub fn len(&self) -> usize {
        self.note_results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.note_results.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    pub fn get(&self, index: usize) -> Option<&NoteResult> {
        self.note_results.iter().find(|r| r.index == index)
    }

    /// Appends a result; returns `false` (and changes nothing) when the note
    /// index was already finalized. The first finalization wins.
    pub fn add_note_result(&mut self, result: NoteResult) -> bool {
        if self.contains(result.index) {
            debug!("Note {} already finalized, ignoring", result.index);
            return false;
        }
        debug!(
            "Finalized note {} as {:?} ({}%)",
            result.index, result.validation.result, result.validation.accuracy
        );
        *self.session_stats.counter_mut(result.validation.result) += 1;
        self.sums.add(&result.validation);
        self.note_results.push(result);
        self.refresh_means();
        true
    }

    /// Replaces the verdict of an already finalized note, keeping its
    /// position in the history.
    pub fn update_note_result(&mut self, index: usize, validation: ValidationResult) -> Result<()> {
        let slot = self
            .note_results
            .iter_mut()
            .find(|r| r.index == index)
            .ok_or(CoachError::NoteResultNotFound(index))?;

        *self.session_stats.counter_mut(slot.validation.result) -= 1;
        self.sums.remove(&slot.validation);

        *self.session_stats.counter_mut(validation.result) += 1;
        self.sums.add(&validation);
        slot.validation = validation;

        self.refresh_means();
        Ok(())
    }

    fn refresh_means(&mut self) {
        let n = self.note_results.len() as f64;
        let mean = |sum: u64| {
            if n > 0.0 {
                round_half_up(sum as f64 / n) as u32
            } else {
                0
            }
        };
        self.session_stats.overall_accuracy = mean(self.sums.overall);
        self.session_stats.pitch_accuracy = mean(self.sums.pitch);
        self.session_stats.duration_accuracy = mean(self.sums.duration);
    }
}
