//! Note-name, MIDI number and frequency conversions shared by the loader,
//! the timeline and the validator.

pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const A4_HZ: f64 = 440.0;
const A4_MIDI: f64 = 69.0;

pub fn midi_from_pitch(step: char, alter: i32, octave: i32) -> i32 {
    let base = match step {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => 0,
    };
    (octave + 1) * 12 + base + alter
}

pub fn midi_to_name(midi: i32) -> String {
    let name = NOTE_NAMES[midi.rem_euclid(12) as usize];
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", name, octave)
}

pub fn midi_to_frequency(midi: f64) -> f64 {
    A4_HZ * 2f64.powf((midi - A4_MIDI) / 12.0)
}

/// Fractional MIDI number for a frequency; `None` for non-positive input.
pub fn frequency_to_midi(hz: f64) -> Option<f64> {
    if hz.is_finite() && hz > 0.0 {
        Some(A4_MIDI + 12.0 * (hz / A4_HZ).log2())
    } else {
        None
    }
}

/// Pitch-class value of a note name without octave: `C` = 0 ... `B` = 11.
/// Accepts any number of `#` / `b` accidentals after the letter, so `E#`
/// and `Cb` are valid (and may cross the octave boundary, see
/// [`parse_pitch_name`]).
pub fn note_class_value(name: &str) -> Option<i32> {
    let mut chars = name.trim().chars();
    let step = chars.next()?.to_ascii_uppercase();
    if !matches!(step, 'A'..='G') {
        return None;
    }
    let mut alter = 0;
    for c in chars {
        match c {
            '#' | '♯' => alter += 1,
            'b' | '♭' => alter -= 1,
            _ => return None,
        }
    }
    Some(midi_from_pitch(step, 0, -1) + alter)
}

/// Octaves a note name may carry; anything else is malformed input.
pub const OCTAVE_RANGE: std::ops::RangeInclusive<i32> = -1..=10;

/// Absolute semitone number (MIDI equivalent) for a note name and octave.
/// `None` for octaves outside [`OCTAVE_RANGE`].
pub fn semitone_number(name: &str, octave: i32) -> Option<i32> {
    if !OCTAVE_RANGE.contains(&octave) {
        return None;
    }
    let class = note_class_value(name)?;
    octave.checked_add(1)?.checked_mul(12)?.checked_add(class)
}

/// Splits a pitch string like `"C4"`, `"Bb3"` or `"F#-1"` into its absolute
/// semitone number.
pub fn parse_pitch_name(pitch: &str) -> Option<i32> {
    let pitch = pitch.trim();
    let split = pitch.find(|c: char| c.is_ascii_digit() || c == '-')?;
    let (name, octave) = pitch.split_at(split);
    let octave: i32 = octave.parse().ok()?;
    semitone_number(name, octave)
}

/// Rounds half-way cases towards positive infinity, matching JavaScript's
/// `Math.round` (`-2.5` rounds to `-2`).
pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_from_pitch() {
        assert_eq!(midi_from_pitch('C', 0, 4), 60);
        assert_eq!(midi_from_pitch('A', 0, 4), 69);
        assert_eq!(midi_from_pitch('C', 1, 4), 61);
        assert_eq!(midi_from_pitch('B', -1, 4), 70);
        assert_eq!(midi_from_pitch('G', 0, 3), 55);
    }

    #[test]
    fn test_midi_to_name() {
        assert_eq!(midi_to_name(60), "C4");
        assert_eq!(midi_to_name(58), "A#3");
        assert_eq!(midi_to_name(0), "C-1");
    }

    #[test]
    fn test_frequency_conversions() {
        assert!((midi_to_frequency(69.0) - 440.0).abs() < 1e-9);
        assert!((midi_to_frequency(60.0) - 261.6256).abs() < 1e-3);
        let midi = frequency_to_midi(261.63).unwrap();
        assert!((midi - 60.0).abs() < 0.01);
        assert_eq!(frequency_to_midi(0.0), None);
        assert_eq!(frequency_to_midi(f64::NAN), None);
    }

    #[test]
    fn test_parse_pitch_name() {
        assert_eq!(parse_pitch_name("C4"), Some(60));
        assert_eq!(parse_pitch_name("Bb3"), Some(58));
        assert_eq!(parse_pitch_name("A#3"), Some(58));
        assert_eq!(parse_pitch_name("B#3"), Some(60));
        assert_eq!(parse_pitch_name("Cb4"), Some(59));
        assert_eq!(parse_pitch_name("C-1"), Some(0));
        assert_eq!(parse_pitch_name("H4"), None);
        assert_eq!(parse_pitch_name("C"), None);
        assert_eq!(parse_pitch_name(""), None);
        assert_eq!(parse_pitch_name("C#x4"), None);
        assert_eq!(parse_pitch_name("G10"), Some(127));
        assert_eq!(parse_pitch_name("C11"), None);
        assert_eq!(parse_pitch_name("C-2"), None);
        assert_eq!(parse_pitch_name("C999999999"), None);
    }

    #[test]
    fn test_semitone_number_rejects_extreme_octaves() {
        assert_eq!(semitone_number("C", 4), Some(60));
        assert_eq!(semitone_number("C", i32::MAX), None);
        assert_eq!(semitone_number("C", i32::MIN), None);
    }

    #[test]
    fn test_round_half_up_matches_js() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(53.333), 53.0);
        assert_eq!(round_half_up(-28.6), -29.0);
    }
}
