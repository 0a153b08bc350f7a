//! Pure note validation: one expected note against one pitch sample.

use crate::config::{SkillLevel, ValidationThresholds};
use crate::notes::{parse_pitch_name, round_half_up, semitone_number};
use crate::pitch::PitchSample;
use crate::score::ExpectedNote;
use crate::scoring::types::{NoteVerdict, ValidationResult};

/// Slack for comparisons against tolerance boundaries, so that a value that
/// is on the boundary in decimal (0.4 s of 0.5 s) is not pushed out by
/// binary rounding.
pub const BOUNDARY_EPSILON: f64 = 1e-9;

pub fn validate(
    expected: &ExpectedNote,
    detected: &PitchSample,
    current_time: f64,
    note_start_time: Option<f64>,
    skill_level: SkillLevel,
) -> ValidationResult {
    validate_with(
        expected,
        detected,
        current_time,
        note_start_time,
        &skill_level.thresholds(),
    )
}

pub fn validate_with(
    expected: &ExpectedNote,
    detected: &PitchSample,
    current_time: f64,
    note_start_time: Option<f64>,
    thresholds: &ValidationThresholds,
) -> ValidationResult {
    // NaN levels count as silence too
    if !detected.is_detecting || !(detected.audio_level >= thresholds.silence_level) {
        return ValidationResult::silent("No sound detected");
    }

    let expected_semitone = parse_pitch_name(&expected.pitch);
    let detected_semitone = semitone_number(&detected.note, detected.octave);
    let (Some(expected_semitone), Some(detected_semitone)) = (expected_semitone, detected_semitone)
    else {
        return invalid("Invalid note data");
    };
    if !(expected.frequency > 0.0 && detected.frequency > 0.0) {
        return invalid("Invalid note frequency");
    }

    let semitone_difference = (expected_semitone - detected_semitone).unsigned_abs();
    let cents_off =
        round_half_up(1200.0 * (detected.frequency / expected.frequency).log2()) as i32;
    let abs_cents = cents_off.unsigned_abs() as f64;

    let (pitch_match, pitch_accuracy) = score_pitch(semitone_difference, abs_cents, thresholds);

    let duration_held = current_time - note_start_time.unwrap_or(current_time);
    let (duration_match, duration_accuracy) =
        score_duration(duration_held, expected.duration, thresholds.duration_tolerance);

    let accuracy = round_half_up((pitch_accuracy + duration_accuracy) as f64 / 2.0) as u32;
    let pitch = &expected.pitch;

    let (result, feedback) = if pitch_match && duration_match {
        (NoteVerdict::Correct, format!("Perfect! {} in tune", pitch))
    } else if semitone_difference == 0 && abs_cents <= thresholds.pitch_tolerance_cents {
        let feedback = if pitch_match {
            format!("{} - Hold longer", pitch)
        } else if duration_match {
            let arrow = if cents_off > 0 { "↓" } else { "↑" };
            format!("{} - Adjust pitch {}", pitch, arrow)
        } else {
            format!("Close! {}", pitch)
        };
        (NoteVerdict::Close, feedback)
    } else {
        let feedback = match semitone_difference {
            0 => format!("{} - Way off pitch", pitch),
            1 if detected_semitone > expected_semitone => format!("Too high - play {}", pitch),
            1 => format!("Too low - play {}", pitch),
            _ => format!(
                "Wrong note - expected {}, heard {}{}",
                pitch, detected.note, detected.octave
            ),
        };
        (NoteVerdict::Wrong, feedback)
    };

    ValidationResult {
        result,
        accuracy,
        pitch_accuracy,
        duration_accuracy,
        pitch_match,
        duration_match,
        cents_off,
        duration_held,
        feedback,
    }
}

fn invalid(feedback: &str) -> ValidationResult {
    ValidationResult {
        result: NoteVerdict::Wrong,
        ..ValidationResult::silent(feedback)
    }
}

fn score_pitch(semitone_difference: u32, abs_cents: f64, t: &ValidationThresholds) -> (bool, u32) {
    let (matched, accuracy) = match semitone_difference {
        0 if abs_cents <= t.close_threshold_cents => {
            (true, 100.0 - (abs_cents / t.close_threshold_cents) * 10.0)
        }
        0 if abs_cents <= t.pitch_tolerance_cents => {
            let band = t.pitch_tolerance_cents - t.close_threshold_cents;
            let into_band = if band > 0.0 {
                (abs_cents - t.close_threshold_cents) / band
            } else {
                1.0
            };
            (false, 70.0 - into_band * 40.0)
        }
        0 => (false, 30.0 - (abs_cents / 100.0).min(1.0) * 30.0),
        1 => (false, 20.0),
        _ => (false, 0.0),
    };
    (matched, clamp_score(accuracy))
}

fn score_duration(held: f64, expected_duration: f64, tolerance: f64) -> (bool, u32) {
    if !(expected_duration > 0.0) || !held.is_finite() || !(tolerance > 0.0) {
        return (false, 30);
    }
    let deviation = (held / expected_duration - 1.0).abs();
    let relative = deviation / tolerance;
    if deviation <= tolerance + BOUNDARY_EPSILON {
        (true, clamp_score(100.0 - relative * 20.0))
    } else if deviation <= 2.0 * tolerance + BOUNDARY_EPSILON {
        (false, clamp_score(60.0 - relative * 20.0))
    } else {
        (false, 30)
    }
}

fn clamp_score(x: f64) -> u32 {
    round_half_up(x).clamp(0.0, 100.0) as u32
}
