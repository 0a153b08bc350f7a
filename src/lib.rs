use wasm_bindgen::prelude::*;

pub mod config;
pub mod error;
pub mod notes;
pub mod pitch;
pub mod playback;
pub mod score;
pub mod scoring;

use std::cell::RefCell;
use std::sync::Arc;

use config::{PlayMode, SessionConfig, SkillLevel};
use pitch::yin::{PitchDetector, YinPitchSource};
use pitch::PitchSample;
use playback::controller::{PlaybackController, SessionInfo};
use playback::session::PracticeSession;
use playback::transport::{CommandTransport, Transport, TransportCommand};
use score::timeline::NoteTimeline;
use score::{ExpectedNote, RawNote};

thread_local! {
    static DETECTOR: RefCell<Option<PitchDetector>> = RefCell::new(None);
}

fn to_js<T: serde::Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn from_js<T: serde::de::DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn parse_musicxml(xml: &str) -> Result<JsValue, JsValue> {
    let notes = score::musicxml::parse_musicxml(xml).map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_js(&notes)
}

/// Normalizes raw notes into the playback timeline.
#[wasm_bindgen]
pub fn build_timeline(raw_notes_js: JsValue, lead_in: Option<f64>) -> Result<JsValue, JsValue> {
    let raw: Vec<RawNote> = from_js(raw_notes_js)?;
    let timeline = NoteTimeline::build_with_lead_in(
        &raw,
        lead_in.unwrap_or(config::DEFAULT_LEAD_IN_SECONDS),
    );
    to_js(timeline.notes())
}

#[wasm_bindgen]
pub fn validate_note(
    expected_js: JsValue,
    sample_js: JsValue,
    current_time: f64,
    note_start_time: Option<f64>,
    skill_level: &str,
) -> Result<JsValue, JsValue> {
    let expected: ExpectedNote = from_js(expected_js)?;
    let sample: PitchSample = from_js(sample_js)?;
    let skill: SkillLevel = skill_level
        .parse()
        .map_err(|e: error::CoachError| JsValue::from_str(&e.to_string()))?;
    let result = scoring::validator::validate(&expected, &sample, current_time, note_start_time, skill);
    to_js(&result)
}

/// YIN-based pitch detection returning Float64Array
/// [hz, cents, audio_level, is_detecting]. Uses a thread-local pre-allocated
/// PitchDetector to avoid per-call allocations.
#[wasm_bindgen]
pub fn detect_pitch(samples: &[f32], sample_rate: f32) -> js_sys::Float64Array {
    let sample = DETECTOR.with(|cell| {
        let mut borrow = cell.borrow_mut();
        if borrow.as_ref().map(|d| d.sample_rate()) != Some(sample_rate) {
            *borrow = Some(PitchDetector::for_trumpet(sample_rate));
        }
        match borrow.as_mut() {
            Some(detector) => detector.sample(samples),
            None => PitchSample::silence(),
        }
    });

    let arr = js_sys::Float64Array::new_with_length(4);
    arr.set_index(0, sample.frequency);
    arr.set_index(1, sample.cents as f64);
    arr.set_index(2, sample.audio_level);
    arr.set_index(3, if sample.is_detecting { 1.0 } else { 0.0 });
    arr
}

#[derive(serde::Serialize)]
struct ModeChange {
    play_mode: PlayMode,
    commands: Vec<TransportCommand>,
}

/// Play-along session driven from the page's animation frame loop.
///
/// Each `tick` takes the audio element's position and paused flag, and
/// returns the commands (`play`, `pause`, `seek`, ...) the page must apply to
/// the element.
#[wasm_bindgen]
pub struct PlayAlong {
    session: PracticeSession<YinPitchSource, CommandTransport>,
}

#[wasm_bindgen]
impl PlayAlong {
    #[wasm_bindgen(constructor)]
    pub fn new(raw_notes_js: JsValue, config_js: JsValue, sample_rate: f32) -> Result<PlayAlong, JsValue> {
        let raw: Vec<RawNote> = from_js(raw_notes_js)?;
        let config: SessionConfig = if config_js.is_null() || config_js.is_undefined() {
            SessionConfig::default()
        } else {
            from_js(config_js)?
        };
        let timeline = Arc::new(NoteTimeline::build_with_lead_in(&raw, config.lead_in_seconds));
        let controller = PlaybackController::new(timeline, config);
        Ok(PlayAlong {
            session: PracticeSession::new(
                controller,
                YinPitchSource::new(sample_rate),
                CommandTransport::new(),
            ),
        })
    }

    pub fn initialize_session(&mut self, info_js: JsValue) -> Result<(), JsValue> {
        let info: SessionInfo = from_js(info_js)?;
        let (controller, _) = self.session.controls();
        controller.initialize_session(info);
        Ok(())
    }

    pub fn reset_session(&mut self) {
        let (controller, _) = self.session.controls();
        controller.reset_session();
    }

    /// Swaps in a new song or difficulty.
    pub fn load_notes(&mut self, raw_notes_js: JsValue) -> Result<(), JsValue> {
        let raw: Vec<RawNote> = from_js(raw_notes_js)?;
        let (controller, _) = self.session.controls();
        let lead_in = controller.config().lead_in_seconds;
        controller.load_timeline(Arc::new(NoteTimeline::build_with_lead_in(&raw, lead_in)));
        Ok(())
    }

    pub fn set_play_mode(&mut self, mode: &str) -> Result<JsValue, JsValue> {
        let mode: PlayMode = mode
            .parse()
            .map_err(|e: error::CoachError| JsValue::from_str(&e.to_string()))?;
        let (controller, transport) = self.session.controls();
        controller.set_play_mode(mode, transport);
        self.drain()
    }

    /// Returns `{ play_mode, commands }` with the new mode and the transport
    /// commands the switch produced.
    pub fn toggle_play_mode(&mut self) -> Result<JsValue, JsValue> {
        to_js(&self.switch_mode())
    }

    pub fn play(&mut self, audio_paused: bool) -> Result<JsValue, JsValue> {
        let (controller, transport) = self.session.controls();
        let position = transport.current_time();
        transport.sync(position, audio_paused);
        controller.play(transport);
        self.drain()
    }

    pub fn pause(&mut self, audio_paused: bool) -> Result<JsValue, JsValue> {
        let (controller, transport) = self.session.controls();
        let position = transport.current_time();
        transport.sync(position, audio_paused);
        controller.pause(transport);
        self.drain()
    }

    pub fn set_tempo(&mut self, rate: f64) -> Result<JsValue, JsValue> {
        let (controller, transport) = self.session.controls();
        controller.set_tempo(rate, transport);
        self.drain()
    }

    pub fn seek(&mut self, time: f64) -> Result<JsValue, JsValue> {
        let (controller, transport) = self.session.controls();
        controller.seek(time, transport);
        self.drain()
    }

    /// Call once microphone access has been granted.
    pub fn start_listening(&mut self) -> Result<(), JsValue> {
        self.session.start().map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn stop_listening(&mut self) -> Result<JsValue, JsValue> {
        self.session.stop();
        self.drain()
    }

    /// Feeds one microphone frame to the pitch detector.
    pub fn push_audio(&mut self, samples: &[f32]) {
        self.session.pitch_source_mut().process_frame(samples);
    }

    pub fn tick(&mut self, position: f64, clock: f64, audio_paused: bool) -> Result<JsValue, JsValue> {
        self.session.transport_mut().sync(position, audio_paused);
        self.session.tick(clock);
        self.drain()
    }

    /// Tick with a pitch reading detected by the page itself.
    pub fn tick_with_sample(
        &mut self,
        position: f64,
        clock: f64,
        sample_js: JsValue,
        audio_paused: bool,
    ) -> Result<JsValue, JsValue> {
        let sample: PitchSample = from_js(sample_js)?;
        self.session.transport_mut().sync(position, audio_paused);
        self.session.tick_with_sample(clock, &sample);
        self.drain()
    }

    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.controller().state())
    }

    pub fn summary(&self) -> Result<JsValue, JsValue> {
        to_js(&scoring::summary::summarize(self.session.controller().results()))
    }

    fn switch_mode(&mut self) -> ModeChange {
        let (controller, transport) = self.session.controls();
        let play_mode = controller.toggle_play_mode(transport);
        ModeChange {
            play_mode,
            commands: self.session.transport_mut().drain_commands(),
        }
    }

    fn drain(&mut self) -> Result<JsValue, JsValue> {
        let commands = self.session.transport_mut().drain_commands();
        to_js(&commands)
    }
}
