use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use trumpet_coach::config::{PlayMode, SessionConfig, SkillLevel};
use trumpet_coach::error::Result;
use trumpet_coach::pitch::{PitchSample, PitchSource};
use trumpet_coach::playback::controller::{PlaybackController, Tick};
use trumpet_coach::playback::session::PracticeSession;
use trumpet_coach::playback::transport::{CommandTransport, Transport, TransportCommand};
use trumpet_coach::score::timeline::NoteTimeline;
use trumpet_coach::score::{ExpectedNote, RawNote};
use trumpet_coach::scoring::stats::NoteResultLog;
use trumpet_coach::scoring::types::{NoteResult, NoteVerdict, ValidationResult};
use trumpet_coach::scoring::validator::validate;

fn c4_note() -> ExpectedNote {
    ExpectedNote {
        pitch: "C4".to_string(),
        frequency: 261.63,
        start_time: 2.0,
        end_time: 2.5,
        duration: 0.5,
        velocity: 0.8,
        index: 0,
    }
}

fn tone(note: &str, octave: i32, hz: f64) -> PitchSample {
    PitchSample {
        note: note.to_string(),
        octave,
        frequency: hz,
        cents: 0,
        is_detecting: true,
        audio_level: 0.5,
    }
}

fn intermediate(mode: PlayMode) -> SessionConfig {
    SessionConfig {
        skill_level: SkillLevel::Intermediate,
        play_mode: mode,
        ..SessionConfig::default()
    }
}

#[test]
fn test_in_tune_note_held_to_boundary() {
    let r = validate(&c4_note(), &tone("C", 4, 261.63), 2.4, Some(2.0), SkillLevel::Intermediate);
    assert_eq!(r.result, NoteVerdict::Correct);
    assert_eq!(r.pitch_accuracy, 100);
    assert!(r.duration_match, "deviation equal to tolerance matches");
    assert!((r.duration_held - 0.4).abs() < 1e-9);
    assert_eq!(r.accuracy, (r.pitch_accuracy + r.duration_accuracy + 1) / 2);
}

#[test]
fn test_slightly_sharp_note_is_close() {
    let r = validate(&c4_note(), &tone("C", 4, 266.0), 2.4, Some(2.0), SkillLevel::Intermediate);
    assert_eq!(r.result, NoteVerdict::Close);
    assert!(!r.pitch_match);
    assert!((20..=30).contains(&r.cents_off));
    assert_eq!(r.feedback, "C4 - Adjust pitch ↓");
}

#[test]
fn test_not_detecting_is_always_silent() {
    let garbage = PitchSample {
        note: "???".to_string(),
        octave: -40,
        frequency: f64::NAN,
        cents: 9999,
        is_detecting: false,
        audio_level: 1.0,
    };
    for skill in [SkillLevel::Beginner, SkillLevel::Intermediate, SkillLevel::Advanced] {
        let r = validate(&c4_note(), &garbage, 2.3, Some(2.0), skill);
        assert_eq!(r.result, NoteVerdict::Silent);
        assert_eq!(r.feedback, "No sound detected");
    }
}

#[test]
fn test_lookup_in_gap_between_notes() {
    let timeline = NoteTimeline::build(&[
        RawNote::new(60, 0.0, 0.9),
        RawNote::new(62, 1.0, 0.9),
        RawNote::new(64, 2.0, 0.9),
    ]);
    assert_eq!(timeline.find_note_index_at_time(1.95), None);
    assert_eq!(timeline.find_note_index_at_time(0.5), Some(0));
    assert_eq!(timeline.find_note_index_at_time(1.0), Some(1));
    assert_eq!(timeline.find_note_index_at_time(2.9), None);
}

#[test]
fn test_lookup_sweep_never_skips() {
    let raw: Vec<RawNote> = (0..24)
        .map(|i| RawNote::new(55 + (i % 12), 3.0 + i as f64 * 0.35, 0.3))
        .collect();
    let timeline = NoteTimeline::build(&raw);
    let end = timeline.end_time();
    let mut t = 0.0;
    let mut last_seen: Option<usize> = None;
    while t <= end + 0.5 {
        let found = timeline.find_note_index_at_time(t);
        let linear = timeline.notes().iter().position(|n| n.contains(t));
        assert_eq!(found, linear, "t = {}", t);
        if let (Some(prev), Some(now)) = (last_seen, found) {
            assert!(now == prev || now == prev + 1, "skipped from {} to {}", prev, now);
        }
        if found.is_some() {
            last_seen = found;
        }
        t += 0.01;
    }
    assert_eq!(last_seen, Some(23));
}

#[test]
fn test_wait_mode_advances_once() {
    let timeline = Arc::new(NoteTimeline::build(&[
        RawNote::new(60, 2.0, 0.5),
        RawNote::new(62, 3.0, 0.5),
    ]));
    let mut c = PlaybackController::new(timeline, intermediate(PlayMode::Wait));
    let mut t = CommandTransport::new();
    c.play(&mut t);
    let c4 = tone("C", 4, 261.63);

    let mut finalized = 0;
    let mut advanced = 0;
    for pos in [2.0, 2.1, 2.2, 2.3, 2.4, 2.41, 2.43, 2.45] {
        let outcome = c.tick(Tick::at(pos), &c4, &mut t);
        if outcome.finalized.is_some() {
            finalized += 1;
            assert_eq!(pos, 2.4);
        }
        if outcome.advanced {
            advanced += 1;
        }
    }
    assert_eq!(finalized, 1);
    assert_eq!(advanced, 1);
    assert_eq!(c.current_note_index(), Some(1));
    assert_eq!(c.note_results().len(), 1);
    assert_eq!(c.note_results()[0].index, 0);
    assert!(!t.is_paused(), "transport resumes after the hold");
}

#[test]
fn test_mean_accuracy_rounds() {
    let mut log = NoteResultLog::new(3);
    for (i, accuracy) in [100u32, 60, 0].into_iter().enumerate() {
        let mut validation = ValidationResult::silent("");
        validation.accuracy = accuracy;
        validation.result = if accuracy > 0 { NoteVerdict::Correct } else { NoteVerdict::Silent };
        log.add_note_result(NoteResult {
            index: i,
            timestamp: i as f64,
            validation,
        });
    }
    assert_eq!(log.stats().overall_accuracy, 53);
    assert_eq!(log.stats().counted_notes() as usize, log.len());
}

#[test]
fn test_validator_is_repeatable_and_bounded() {
    let note = c4_note();
    let samples = [
        tone("C", 4, 261.63),
        tone("C", 4, 250.0),
        tone("C#", 4, 277.18),
        tone("G", 3, 196.0),
        tone("C", 6, 1046.5),
        PitchSample::silence(),
    ];
    for sample in &samples {
        for start in [None, Some(2.0), Some(2.2), Some(1.0)] {
            for now in [2.0, 2.25, 2.5, 3.0] {
                for skill in [SkillLevel::Beginner, SkillLevel::Intermediate, SkillLevel::Advanced] {
                    let a = validate(&note, sample, now, start, skill);
                    let b = validate(&note, sample, now, start, skill);
                    assert_eq!(a, b);
                    assert!(a.accuracy <= 100);
                    assert!(a.pitch_accuracy <= 100);
                    assert!(a.duration_accuracy <= 100);
                }
            }
        }
    }
}

#[test]
fn test_flow_run_through_song() {
    let timeline = Arc::new(NoteTimeline::build(&[
        RawNote::new(60, 0.0, 0.5),
        RawNote::new(62, 0.5, 0.5),
        RawNote::new(64, 1.0, 0.5),
    ]));
    let mut c = PlaybackController::new(timeline, intermediate(PlayMode::Flow));
    let mut t = CommandTransport::new();
    c.play(&mut t);
    t.drain_commands();

    let mut pos: f64 = 0.0;
    while pos < 1.6 {
        let sample = if pos < 0.5 {
            tone("C", 4, 261.63)
        } else if pos < 1.0 {
            tone("E", 4, 329.63)
        } else {
            PitchSample::silence()
        };
        c.tick(Tick::at(pos), &sample, &mut t);
        pos += 1.0 / 60.0;
    }

    let verdicts: Vec<NoteVerdict> = c.note_results().iter().map(|r| r.validation.result).collect();
    assert_eq!(verdicts, vec![NoteVerdict::Correct, NoteVerdict::Wrong, NoteVerdict::Silent]);
    let stats = c.session_stats();
    assert_eq!(stats.total_notes, 3);
    assert_eq!(stats.counted_notes(), 3);
    assert!(!t.drain_commands().contains(&TransportCommand::Pause));
}

struct CountingSource {
    running: bool,
    stops: Rc<Cell<u32>>,
}

impl PitchSource for CountingSource {
    fn start(&mut self) -> Result<()> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
        self.stops.set(self.stops.get() + 1);
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn current_sample(&self) -> PitchSample {
        PitchSample::silence()
    }
}

#[test]
fn test_session_releases_source_on_early_return() {
    fn practice(stops: Rc<Cell<u32>>) -> Option<()> {
        let timeline = Arc::new(NoteTimeline::build(&[RawNote::new(60, 0.0, 1.0)]));
        let controller = PlaybackController::new(timeline, SessionConfig::default());
        let source = CountingSource { running: false, stops };
        let mut session = PracticeSession::new(controller, source, CommandTransport::new());
        session.start().ok()?;
        let (controller, transport) = session.controls();
        controller.play(transport);
        session.tick(0.1)?;
        // bail out without calling stop()
        None
    }

    let stops = Rc::new(Cell::new(0));
    assert_eq!(practice(stops.clone()), None);
    assert_eq!(stops.get(), 1);
}
