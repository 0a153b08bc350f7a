use serde::Serialize;

use crate::scoring::stats::NoteResultLog;
use crate::scoring::types::{NoteVerdict, SessionStats};

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub stats: SessionStats,
    /// Finalized notes over total notes, 0..=1.
    pub completion: f64,
    pub avg_cents_off: f64,
    pub pitch_tendency: String, // "sharp", "flat", "accurate"
    pub feedback: Vec<String>,
}

pub fn summarize(log: &NoteResultLog) -> SessionSummary {
    let stats = log.stats().clone();
    let finalized = log.len() as u32;

    let completion = if stats.total_notes > 0 {
        (finalized as f64 / stats.total_notes as f64).min(1.0)
    } else {
        0.0
    };

    // Only notes where the right pitch class was sounded say anything about
    // intonation.
    let cents: Vec<f64> = log
        .note_results()
        .iter()
        .filter(|r| r.validation.result.is_pitch_correct())
        .map(|r| r.validation.cents_off as f64)
        .collect();
    let avg_cents_off = if !cents.is_empty() {
        cents.iter().sum::<f64>() / cents.len() as f64
    } else {
        0.0
    };

    let pitch_tendency = if avg_cents_off > 10.0 {
        "sharp"
    } else if avg_cents_off < -10.0 {
        "flat"
    } else {
        "accurate"
    }
    .to_string();

    let mut feedback: Vec<String> = Vec::new();

    if finalized > 0 {
        let pct = (stats.correct_notes as f64 / finalized as f64) * 100.0;
        if pct >= 90.0 {
            feedback.push(format!("Excellent! You nailed {:.0}% of the notes.", pct));
        } else if pct >= 70.0 {
            feedback.push(format!("Good job! You got {:.0}% of the notes right.", pct));
        } else if pct >= 50.0 {
            feedback.push(format!(
                "Keep practicing! You hit {:.0}% of the notes correctly.",
                pct
            ));
        } else {
            feedback.push(format!(
                "This one's tough! You got {:.0}% correct. Try slowing down the tempo.",
                pct
            ));
        }
    }

    if stats.silent_notes > 0 {
        feedback.push(format!(
            "{} note{} went unplayed. Make sure to play through the whole piece.",
            stats.silent_notes,
            if stats.silent_notes == 1 { "" } else { "s" }
        ));
    }

    if pitch_tendency == "sharp" {
        feedback.push(format!(
            "Your pitch is consistently {:.0} cents sharp. Try relaxing your embouchure slightly.",
            avg_cents_off
        ));
    } else if pitch_tendency == "flat" {
        feedback.push(format!(
            "Your pitch is consistently {:.0} cents flat. Try firming up your embouchure and using more air support.",
            avg_cents_off.abs()
        ));
    }

    let held_short = log
        .note_results()
        .iter()
        .filter(|r| r.validation.result == NoteVerdict::Close && r.validation.pitch_match)
        .count();
    if finalized > 0 && stats.duration_accuracy + 15 < stats.pitch_accuracy && held_short > 0 {
        feedback.push(
            "Your notes are in tune but cut short. Keep the air going for the full value."
                .to_string(),
        );
    }

    if feedback.is_empty() {
        feedback.push("Play with the mic active to get feedback!".to_string());
    }

    SessionSummary {
        stats,
        completion,
        avg_cents_off,
        pitch_tendency,
        feedback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::types::{NoteResult, ValidationResult};

    fn finalized(index: usize, result: NoteVerdict, cents_off: i32, pitch: u32, duration: u32) -> NoteResult {
        NoteResult {
            index,
            timestamp: 0.0,
            validation: ValidationResult {
                result,
                accuracy: (pitch + duration) / 2,
                pitch_accuracy: pitch,
                duration_accuracy: duration,
                pitch_match: result == NoteVerdict::Correct || pitch >= 90,
                duration_match: result == NoteVerdict::Correct,
                cents_off,
                duration_held: 0.0,
                feedback: String::new(),
            },
        }
    }

    #[test]
    fn test_empty_session() {
        let summary = summarize(&NoteResultLog::new(10));
        assert_eq!(summary.completion, 0.0);
        assert_eq!(summary.pitch_tendency, "accurate");
        assert_eq!(summary.feedback, vec!["Play with the mic active to get feedback!".to_string()]);
    }

    #[test]
    fn test_sharp_player() {
        let mut log = NoteResultLog::new(4);
        log.add_note_result(finalized(0, NoteVerdict::Close, 26, 50, 100));
        log.add_note_result(finalized(1, NoteVerdict::Close, 22, 50, 100));
        log.add_note_result(finalized(2, NoteVerdict::Wrong, -300, 0, 100));
        let summary = summarize(&log);
        assert_eq!(summary.pitch_tendency, "sharp");
        assert!((summary.avg_cents_off - 24.0).abs() < 1e-9);
        assert!((summary.completion - 0.75).abs() < 1e-9);
        assert!(summary.feedback[0].starts_with("This one's tough!"));
        assert!(summary.feedback.iter().any(|f| f.contains("24 cents sharp")));
    }

    #[test]
    fn test_good_run_with_silence_and_short_holds() {
        let mut log = NoteResultLog::new(4);
        log.add_note_result(finalized(0, NoteVerdict::Correct, 0, 100, 100));
        log.add_note_result(finalized(1, NoteVerdict::Correct, 2, 98, 90));
        log.add_note_result(finalized(2, NoteVerdict::Close, -1, 99, 30));
        log.add_note_result(finalized(3, NoteVerdict::Silent, 0, 0, 0));
        let summary = summarize(&log);
        assert_eq!(summary.completion, 1.0);
        assert_eq!(summary.pitch_tendency, "accurate");
        assert!(summary.feedback[0].starts_with("Keep practicing!"));
        assert!(summary.feedback.iter().any(|f| f.starts_with("1 note went unplayed")));
        assert!(summary.feedback.iter().any(|f| f.contains("cut short")));
    }
}
