//! Per-frame playback control: tracks the current note, scores it, and in
//! wait mode gates the transport until the note has been held.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{PlayMode, SessionConfig, ValidationThresholds};
use crate::error::Result;
use crate::notes::round_half_up;
use crate::pitch::PitchSample;
use crate::playback::transport::Transport;
use crate::score::timeline::NoteTimeline;
use crate::score::ExpectedNote;
use crate::scoring::stats::NoteResultLog;
use crate::scoring::types::{NoteResult, NoteVerdict, SessionStats, ValidationResult};
use crate::scoring::validator::{validate_with, BOUNDARY_EPSILON};

/// Time inputs for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tick {
    /// Transport position, used for the timeline lookup.
    pub position: f64,
    /// Monotonic seconds used for hold timing. Keeps running while wait
    /// mode holds the transport paused.
    pub clock: f64,
}

impl Tick {
    pub fn new(position: f64, clock: f64) -> Self {
        Tick { position, clock }
    }

    /// Position and clock moving together, as in uninterrupted playback.
    pub fn at(t: f64) -> Self {
        Tick::new(t, t)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SessionInfo {
    pub song_id: String,
    pub difficulty: String,
    /// Song length in seconds; the timeline end is used when zero.
    pub duration: f64,
    /// Notes in the song; the timeline length is used when zero.
    pub total_notes: u32,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPhase {
    Idle,
    FlowPlaying,
    FlowPaused,
    WaitPlaying,
    /// Transport paused while the player sustains the right note.
    WaitHolding,
    /// Transport paused until the right note is played.
    WaitPaused,
    Ended,
}

/// Everything the UI renders.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct PlaybackState {
    pub session: Option<SessionInfo>,
    pub is_playing: bool,
    pub phase: PlaybackPhase,
    pub current_time: f64,
    pub duration: f64,
    pub tempo: f64,
    pub play_mode: PlayMode,
    pub current_note_index: Option<usize>,
    pub expected_note: Option<ExpectedNote>,
    /// Clock time at which the player started sounding the current note.
    pub note_start_time: Option<f64>,
    pub current_note_result: Option<ValidationResult>,
    #[serde(flatten)]
    pub results: NoteResultLog,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickOutcome {
    pub note_index: Option<usize>,
    /// Note finalized during this tick.
    pub finalized: Option<usize>,
    /// Wait mode moved past a completed note ahead of the timeline.
    pub advanced: bool,
}

pub struct PlaybackController {
    timeline: Arc<NoteTimeline>,
    config: SessionConfig,
    thresholds: ValidationThresholds,
    state: PlaybackState,
    started: bool,
    ended: bool,
    /// Note completed in wait mode before the timeline moved off it;
    /// lookups that still land on it are ignored.
    completed_early: Option<usize>,
}

impl PlaybackController {
    pub fn new(timeline: Arc<NoteTimeline>, config: SessionConfig) -> Self {
        let state = fresh_state(&timeline, &config);
        PlaybackController {
            thresholds: config.effective_thresholds(),
            timeline,
            config,
            state,
            started: false,
            ended: false,
            completed_early: None,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.state.phase
    }

    pub fn play_mode(&self) -> PlayMode {
        self.state.play_mode
    }

    pub fn current_note_index(&self) -> Option<usize> {
        self.state.current_note_index
    }

    pub fn expected_note(&self) -> Option<&ExpectedNote> {
        self.state.expected_note.as_ref()
    }

    pub fn current_note_result(&self) -> Option<&ValidationResult> {
        self.state.current_note_result.as_ref()
    }

    pub fn note_results(&self) -> &[NoteResult] {
        self.state.results.note_results()
    }

    pub fn session_stats(&self) -> &SessionStats {
        self.state.results.stats()
    }

    pub fn results(&self) -> &NoteResultLog {
        &self.state.results
    }

    pub fn timeline(&self) -> &Arc<NoteTimeline> {
        &self.timeline
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Starts over on the loaded timeline, clearing all per-session state.
    pub fn initialize_session(&mut self, info: SessionInfo) {
        info!(
            "Initializing session for song {} ({}), {} notes",
            info.song_id,
            info.difficulty,
            self.timeline.len()
        );
        self.restart();
        if info.duration > 0.0 {
            self.state.duration = info.duration;
        }
        if info.total_notes > 0 {
            self.state.results = NoteResultLog::new(info.total_notes);
        }
        self.state.session = Some(info);
    }

    /// Replaces the timeline (new song or difficulty) and clears the session.
    pub fn load_timeline(&mut self, timeline: Arc<NoteTimeline>) {
        self.timeline = timeline;
        self.restart();
    }

    /// Drops the song and everything recorded for it.
    pub fn reset_session(&mut self) {
        info!("Resetting session");
        self.timeline = Arc::new(NoteTimeline::default());
        self.restart();
    }

    fn restart(&mut self) {
        self.state = fresh_state(&self.timeline, &self.config);
        self.started = false;
        self.ended = false;
        self.completed_early = None;
    }

    pub fn play<T: Transport>(&mut self, transport: &mut T) {
        self.state.is_playing = true;
        self.started = true;
        if transport.is_paused() {
            transport.play();
        }
        self.refresh_phase(transport.is_paused());
    }

    pub fn pause<T: Transport>(&mut self, transport: &mut T) {
        self.state.is_playing = false;
        if !transport.is_paused() {
            transport.pause();
        }
        self.refresh_phase(transport.is_paused());
    }

    pub fn set_play_mode<T: Transport>(&mut self, mode: PlayMode, transport: &mut T) {
        if mode == self.state.play_mode {
            return;
        }
        info!("Play mode {:?} -> {:?}", self.state.play_mode, mode);
        self.state.play_mode = mode;
        self.config.play_mode = mode;
        // flow mode never holds the backing track
        if mode == PlayMode::Flow && self.state.is_playing && transport.is_paused() {
            transport.play();
        }
        self.refresh_phase(transport.is_paused());
    }

    pub fn toggle_play_mode<T: Transport>(&mut self, transport: &mut T) -> PlayMode {
        let mode = self.state.play_mode.toggled();
        self.set_play_mode(mode, transport);
        mode
    }

    /// Ignores non-positive or non-finite rates.
    pub fn set_tempo<T: Transport>(&mut self, rate: f64, transport: &mut T) {
        if rate.is_finite() && rate > 0.0 {
            self.state.tempo = rate;
            self.config.tempo = rate;
            transport.set_playback_rate(rate);
        }
    }

    pub fn seek<T: Transport>(&mut self, time: f64, transport: &mut T) {
        transport.seek(time);
        self.state.current_time = time;
        self.state.note_start_time = None;
        self.completed_early = None;
        self.ended = false;
        self.refresh_phase(transport.is_paused());
    }

    /// Corrects the verdict of an already finalized note.
    pub fn update_note_result(&mut self, index: usize, validation: ValidationResult) -> Result<()> {
        self.state.results.update_note_result(index, validation)
    }

    /// One frame of the control loop. Does nothing unless playing.
    pub fn tick<T: Transport>(
        &mut self,
        tick: Tick,
        sample: &PitchSample,
        transport: &mut T,
    ) -> TickOutcome {
        let mut outcome = TickOutcome {
            note_index: self.state.current_note_index,
            ..TickOutcome::default()
        };
        if !self.state.is_playing {
            return outcome;
        }
        self.state.current_time = tick.position;

        let looked_up = self.timeline.find_note_index_at_time(tick.position);
        let target = self.resolve_lookup(looked_up, tick.position);
        if target != self.state.current_note_index {
            outcome.finalized = self.finalize_elapsed(tick.position);
            self.enter_note(target, transport);
        }

        if let Some(expected) = self.state.expected_note.clone() {
            let validation = validate_with(
                &expected,
                sample,
                tick.clock,
                self.state.note_start_time,
                &self.thresholds,
            );
            match self.state.play_mode {
                PlayMode::Flow => self.flow_step(&expected, validation, sample, tick, &mut outcome),
                PlayMode::Wait => {
                    self.wait_step(&expected, validation, sample, tick, transport, &mut outcome)
                }
            }
        }

        if !self.ended
            && self.state.current_note_index.is_none()
            && self.state.duration > 0.0
            && tick.position >= self.state.duration
        {
            info!("Reached end of song at {:.2}s", tick.position);
            self.ended = true;
        }

        outcome.note_index = self.state.current_note_index;
        self.refresh_phase(transport.is_paused());
        outcome
    }

    /// After an early advance, stays on the advanced-to note while the
    /// transport is still on the finished note or in the gap before the
    /// next one.
    fn resolve_lookup(&mut self, looked_up: Option<usize>, position: f64) -> Option<usize> {
        let Some(done) = self.completed_early else {
            return looked_up;
        };
        let ahead_of_track = self
            .state
            .expected_note
            .as_ref()
            .is_some_and(|next| position < next.start_time);
        if looked_up == Some(done) || (looked_up.is_none() && ahead_of_track) {
            return self.state.current_note_index;
        }
        self.completed_early = None;
        looked_up
    }

    fn enter_note<T: Transport>(&mut self, index: Option<usize>, transport: &mut T) {
        debug!("Current note {:?} -> {:?}", self.state.current_note_index, index);
        self.state.current_note_index = index;
        self.state.expected_note = index.and_then(|i| self.timeline.get(i).cloned());
        self.state.note_start_time = None;
        self.state.current_note_result = None;
        transport.highlight_note(index);
    }

    /// Flow mode: the note being left is finalized once its end has passed,
    /// with the last verdict seen for it.
    fn finalize_elapsed(&mut self, position: f64) -> Option<usize> {
        if self.state.play_mode != PlayMode::Flow {
            return None;
        }
        let expected = self.state.expected_note.as_ref()?;
        if position + BOUNDARY_EPSILON < expected.end_time {
            return None;
        }
        let index = expected.index;
        let validation = self
            .state
            .current_note_result
            .clone()
            .unwrap_or_else(|| ValidationResult::silent("No sound detected"));
        self.finalize(index, validation, position)
    }

    fn finalize(&mut self, index: usize, validation: ValidationResult, position: f64) -> Option<usize> {
        let added = self.state.results.add_note_result(NoteResult {
            index,
            timestamp: position,
            validation,
        });
        added.then_some(index)
    }

    fn flow_step(
        &mut self,
        expected: &ExpectedNote,
        validation: ValidationResult,
        sample: &PitchSample,
        tick: Tick,
        outcome: &mut TickOutcome,
    ) {
        if validation.result.is_pitch_correct()
            && sample.is_detecting
            && self.state.note_start_time.is_none()
        {
            self.state.note_start_time = Some(tick.clock);
        }
        if tick.position + BOUNDARY_EPSILON >= expected.end_time {
            if let Some(index) = self.finalize(expected.index, validation.clone(), tick.position) {
                outcome.finalized = Some(index);
            }
        }
        self.state.current_note_result = Some(validation);
    }

    fn wait_step<T: Transport>(
        &mut self,
        expected: &ExpectedNote,
        validation: ValidationResult,
        sample: &PitchSample,
        tick: Tick,
        transport: &mut T,
        outcome: &mut TickOutcome,
    ) {
        // Reached by early advance: the backing track has not arrived yet.
        if tick.position < expected.start_time {
            self.state.current_note_result = Some(validation);
            return;
        }

        let pitch_correct = validation.result.is_pitch_correct();
        if pitch_correct && self.state.note_start_time.is_none() && sample.is_detecting {
            self.state.note_start_time = Some(tick.clock);
            if !transport.is_paused() {
                debug!("Holding transport on note {}", expected.index);
                transport.pause();
            }
        }
        if !pitch_correct && self.state.note_start_time.is_some() {
            self.state.note_start_time = None;
        }

        let held = match (pitch_correct, self.state.note_start_time) {
            (true, Some(start)) => tick.clock - start,
            _ => 0.0,
        };
        let duration_met =
            held + BOUNDARY_EPSILON >= self.config.wait_hold_fraction * expected.duration;

        if duration_met {
            let validation = ValidationResult {
                duration_held: held,
                ..validation
            };
            if let Some(index) = self.finalize(expected.index, validation, tick.position) {
                outcome.finalized = Some(index);
            }
            self.state.note_start_time = None;
            if transport.is_paused() {
                transport.play();
            }
            let next = Some(expected.index + 1).filter(|&i| i < self.timeline.len());
            debug!("Note {} held, advancing to {:?}", expected.index, next);
            self.completed_early = Some(expected.index);
            self.enter_note(next, transport);
            outcome.advanced = true;
            return;
        }

        if pitch_correct && self.state.note_start_time.is_some() {
            let pct = round_half_up(100.0 * (held / expected.duration).min(1.0));
            self.state.current_note_result = Some(ValidationResult {
                feedback: format!("Hold it... {}%", pct),
                ..validation
            });
        } else {
            if !transport.is_paused() {
                transport.pause();
            }
            let result = if sample.is_detecting && validation.result != NoteVerdict::Silent {
                NoteVerdict::Wrong
            } else {
                NoteVerdict::Silent
            };
            self.state.current_note_result = Some(ValidationResult {
                result,
                feedback: format!("Play {}", expected.pitch),
                ..validation
            });
        }
    }

    fn refresh_phase(&mut self, transport_paused: bool) {
        let s = &self.state;
        let phase = if self.ended {
            PlaybackPhase::Ended
        } else if !self.started {
            PlaybackPhase::Idle
        } else {
            match s.play_mode {
                PlayMode::Flow if s.is_playing && !transport_paused => PlaybackPhase::FlowPlaying,
                PlayMode::Flow => PlaybackPhase::FlowPaused,
                PlayMode::Wait if !s.is_playing => PlaybackPhase::WaitPaused,
                PlayMode::Wait if !transport_paused => PlaybackPhase::WaitPlaying,
                PlayMode::Wait if s.note_start_time.is_some() => PlaybackPhase::WaitHolding,
                PlayMode::Wait => PlaybackPhase::WaitPaused,
            }
        };
        self.state.phase = phase;
    }
}

fn fresh_state(timeline: &NoteTimeline, config: &SessionConfig) -> PlaybackState {
    PlaybackState {
        session: None,
        is_playing: false,
        phase: PlaybackPhase::Idle,
        current_time: 0.0,
        duration: timeline.end_time(),
        tempo: config.tempo,
        play_mode: config.play_mode,
        current_note_index: None,
        expected_note: None,
        note_start_time: None,
        current_note_result: None,
        results: NoteResultLog::new(timeline.len() as u32),
    }
}
