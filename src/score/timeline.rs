//! The normalized, immutable note timeline and its time lookup.

use tracing::warn;

use crate::config::DEFAULT_LEAD_IN_SECONDS;
use crate::notes::{midi_to_frequency, midi_to_name};
use crate::score::{ExpectedNote, RawNote};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NoteTimeline {
    notes: Vec<ExpectedNote>,
    has_overlaps: bool,
}

impl NoteTimeline {
    /// Builds a timeline keeping the default two-second lead-in.
    pub fn build(raw_notes: &[RawNote]) -> Self {
        Self::build_with_lead_in(raw_notes, DEFAULT_LEAD_IN_SECONDS)
    }

    /// Sorts, indexes and time-shifts raw notes. A first onset later than
    /// `lead_in` is pulled back so that exactly `lead_in` seconds of silence
    /// precede it; earlier onsets are left as they are. Notes that fail
    /// [`RawNote::check`] are skipped.
    pub fn build_with_lead_in(raw_notes: &[RawNote], lead_in: f64) -> Self {
        let valid: Vec<&RawNote> = raw_notes
            .iter()
            .filter(|raw| match raw.check() {
                Ok(()) => true,
                Err(e) => {
                    warn!("Skipping note while building timeline: {}", e);
                    false
                }
            })
            .collect();

        let min_start = valid.iter().map(|n| n.time).fold(f64::INFINITY, f64::min);
        let offset = if min_start.is_finite() && min_start > lead_in {
            min_start - lead_in
        } else {
            0.0
        };

        let mut notes: Vec<ExpectedNote> = valid
            .into_iter()
            .map(|raw| {
                let start_time = raw.time - offset;
                let pitch = if raw.name.trim().is_empty() {
                    midi_to_name(raw.midi_number)
                } else {
                    raw.name.trim().to_string()
                };
                ExpectedNote {
                    pitch,
                    frequency: midi_to_frequency(raw.midi_number as f64),
                    start_time,
                    end_time: start_time + raw.duration,
                    duration: raw.duration,
                    velocity: raw.velocity,
                    index: 0,
                }
            })
            .collect();

        // Vec::sort_by is stable, so simultaneous onsets keep arrival order.
        notes.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        for (i, note) in notes.iter_mut().enumerate() {
            note.index = i;
        }

        let has_overlaps = notes
            .windows(2)
            .any(|pair| pair[0].end_time > pair[1].start_time);
        if has_overlaps {
            warn!(
                "Timeline has overlapping notes; lookups return the first match in index order"
            );
        }

        NoteTimeline {
            notes,
            has_overlaps,
        }
    }

    pub fn notes(&self) -> &[ExpectedNote] {
        &self.notes
    }

    pub fn get(&self, index: usize) -> Option<&ExpectedNote> {
        self.notes.get(index)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn has_overlaps(&self) -> bool {
        self.has_overlaps
    }

    /// End time of the last-ending note, or 0 for an empty timeline.
    pub fn end_time(&self) -> f64 {
        self.notes.iter().map(|n| n.end_time).fold(0.0, f64::max)
    }

    /// Index of the note sounding at `t` (`start_time <= t < end_time`), or
    /// `None` in gaps, before the first note and after the last one.
    pub fn find_note_index_at_time(&self, t: f64) -> Option<usize> {
        find_note_index_at_time(t, &self.notes, self.has_overlaps)
    }
}

/// Lookup over a slice sorted by `start_time`. With `may_overlap` set the
/// slice is scanned so the lowest matching index wins; otherwise only the
/// last note starting at or before `t` can contain it.
pub fn find_note_index_at_time(t: f64, notes: &[ExpectedNote], may_overlap: bool) -> Option<usize> {
    if t.is_nan() {
        return None;
    }
    let started = notes.partition_point(|n| n.start_time <= t);
    if may_overlap {
        return notes[..started].iter().position(|n| n.contains(t));
    }
    let candidate = started.checked_sub(1)?;
    notes[candidate].contains(t).then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(midi: i32, time: f64, duration: f64) -> RawNote {
        RawNote::new(midi, time, duration)
    }

    fn three_notes() -> NoteTimeline {
        NoteTimeline::build(&[raw(60, 0.0, 0.9), raw(62, 1.0, 0.9), raw(64, 2.0, 0.9)])
    }

    #[test]
    fn test_lookup_inside_notes_and_gaps() {
        let timeline = three_notes();
        assert_eq!(timeline.find_note_index_at_time(0.0), Some(0));
        assert_eq!(timeline.find_note_index_at_time(0.5), Some(0));
        assert_eq!(timeline.find_note_index_at_time(0.95), None);
        assert_eq!(timeline.find_note_index_at_time(1.0), Some(1));
        assert_eq!(timeline.find_note_index_at_time(1.95), None);
        assert_eq!(timeline.find_note_index_at_time(2.5), Some(2));
        assert_eq!(timeline.find_note_index_at_time(2.9), None);
        assert_eq!(timeline.find_note_index_at_time(10.0), None);
        assert_eq!(timeline.find_note_index_at_time(-1.0), None);
        assert_eq!(timeline.find_note_index_at_time(f64::NAN), None);
    }

    #[test]
    fn test_lead_in_trimmed_to_two_seconds() {
        let timeline = NoteTimeline::build(&[raw(60, 10.0, 0.5), raw(62, 10.5, 0.5)]);
        let notes = timeline.notes();
        assert!((notes[0].start_time - 2.0).abs() < 1e-9);
        assert!((notes[0].end_time - 2.5).abs() < 1e-9);
        assert!((notes[1].start_time - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_short_lead_in_untouched() {
        let timeline = NoteTimeline::build(&[raw(60, 1.5, 0.5)]);
        assert_eq!(timeline.notes()[0].start_time, 1.5);
        assert_eq!(timeline.notes()[0].end_time, 2.0);
    }

    #[test]
    fn test_sorting_is_stable_and_indexed() {
        let timeline = NoteTimeline::build(&[
            raw(64, 2.0, 0.5),
            raw(60, 0.0, 0.5),
            raw(62, 1.0, 0.5),
            raw(65, 1.0, 0.5),
        ]);
        let pitches: Vec<&str> = timeline.notes().iter().map(|n| n.pitch.as_str()).collect();
        assert_eq!(pitches, vec!["C4", "D4", "F4", "E4"]);
        for (i, note) in timeline.notes().iter().enumerate() {
            assert_eq!(note.index, i);
            assert!(note.start_time < note.end_time);
        }
        assert!(timeline.has_overlaps());
    }

    #[test]
    fn test_frequency_and_name_derived() {
        let mut note = raw(69, 0.0, 1.0);
        note.name = String::new();
        let timeline = NoteTimeline::build(&[note]);
        let expected = &timeline.notes()[0];
        assert_eq!(expected.pitch, "A4");
        assert!((expected.frequency - 440.0).abs() < 1e-9);
    }

    #[test]
    fn test_overlap_returns_first_match() {
        let timeline = NoteTimeline::build(&[raw(60, 0.0, 2.0), raw(62, 1.0, 0.5)]);
        assert!(timeline.has_overlaps());
        assert_eq!(timeline.find_note_index_at_time(1.2), Some(0));
        assert_eq!(timeline.find_note_index_at_time(1.8), Some(0));
    }

    #[test]
    fn test_malformed_notes_skipped() {
        let timeline = NoteTimeline::build(&[
            raw(60, f64::NAN, 0.5),
            raw(62, 0.0, 0.0),
            raw(200, 0.0, 1.0),
            raw(64, 0.5, 0.5),
        ]);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.notes()[0].pitch, "E4");
    }

    #[test]
    fn test_empty_timeline() {
        let timeline = NoteTimeline::build(&[]);
        assert!(timeline.is_empty());
        assert_eq!(timeline.end_time(), 0.0);
        assert_eq!(timeline.find_note_index_at_time(0.0), None);
    }

    #[test]
    fn test_lookup_never_skips_at_10ms_resolution() {
        let raws: Vec<RawNote> = (0..50)
            .map(|i| raw(60 + (i % 12), i as f64 * 0.5, 0.4))
            .collect();
        let timeline = NoteTimeline::build(&raws);
        let mut seen = Vec::new();
        let mut t = 0.0;
        while t < timeline.end_time() + 1.0 {
            let found = timeline.find_note_index_at_time(t);
            let linear = timeline.notes().iter().position(|n| n.contains(t));
            assert_eq!(found, linear, "mismatch at t={}", t);
            if let Some(i) = found {
                if seen.last() != Some(&i) {
                    seen.push(i);
                }
            }
            t += 0.01;
        }
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }
}
