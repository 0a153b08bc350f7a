use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::warn;

use crate::error::{CoachError, Result};
use crate::notes::{midi_from_pitch, midi_to_name};
use crate::score::{default_velocity, RawNote};

const DEFAULT_TEMPO: f64 = 120.0;

fn attr_f64(e: &BytesStart, key: &[u8]) -> Option<f64> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| std::str::from_utf8(&a.value).ok()?.trim().parse::<f64>().ok())
}

fn attr_str(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| std::str::from_utf8(&a.value).ok().map(str::to_string))
}

/// Seconds-per-division bookkeeping: tempo may change mid-piece, so time is
/// accumulated in seconds rather than derived from beats at the end.
struct Clock {
    divisions: f64,
    tempo: f64,
    seconds: f64,
}

impl Clock {
    fn to_seconds(&self, divs: f64) -> f64 {
        divs / self.divisions * 60.0 / self.tempo
    }
}

#[derive(Default)]
struct PendingNote {
    is_rest: bool,
    is_chord: bool,
    is_grace: bool,
    tie_stop: bool,
    duration_divs: Option<f64>,
    step: Option<char>,
    alter: i32,
    octave: Option<i32>,
}

/// Reads the first part of a MusicXML score into raw notes, in seconds.
pub fn parse_musicxml(xml: &str) -> Result<Vec<RawNote>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut clock = Clock {
        divisions: 1.0,
        tempo: DEFAULT_TEMPO,
        seconds: 0.0,
    };
    let mut notes: Vec<RawNote> = Vec::new();
    let mut velocity = default_velocity();

    let mut current_tag: Option<&'static str> = None;
    let mut note: Option<PendingNote> = None;
    let mut last_onset: f64 = 0.0;
    // duration of a <backup>/<forward> being read
    let mut shift_divs: Option<(f64, bool)> = None;
    let mut in_part = false;
    let mut parts_seen = 0u32;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"part" => {
                    parts_seen += 1;
                    in_part = parts_seen == 1;
                    if parts_seen == 2 {
                        warn!("MusicXML has several parts; only the first is loaded");
                    }
                }
                b"note" if in_part => note = Some(PendingNote::default()),
                b"rest" => {
                    if let Some(n) = note.as_mut() {
                        n.is_rest = true;
                    }
                }
                b"backup" if in_part => shift_divs = Some((0.0, false)),
                b"forward" if in_part => shift_divs = Some((0.0, true)),
                b"sound" => apply_sound(e, &mut clock, &mut velocity),
                b"divisions" => current_tag = Some("divisions"),
                b"duration" => current_tag = Some("duration"),
                b"step" => current_tag = Some("step"),
                b"alter" => current_tag = Some("alter"),
                b"octave" => current_tag = Some("octave"),
                b"per-minute" => current_tag = Some("per-minute"),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"sound" => apply_sound(e, &mut clock, &mut velocity),
                b"rest" | b"chord" | b"grace" | b"tie" => {
                    if let Some(n) = note.as_mut() {
                        match e.local_name().as_ref() {
                            b"rest" => n.is_rest = true,
                            b"chord" => n.is_chord = true,
                            b"grace" => n.is_grace = true,
                            _ => {
                                if attr_str(e, b"type").as_deref() == Some("stop") {
                                    n.tie_stop = true;
                                }
                            }
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if let Some(tag) = current_tag.take() {
                    let text = e.unescape().map_err(|e| CoachError::Xml(e.to_string()))?;
                    let text = text.trim();
                    match tag {
                        "divisions" => {
                            if let Ok(v) = text.parse::<f64>() {
                                if v > 0.0 {
                                    clock.divisions = v;
                                }
                            }
                        }
                        "per-minute" => {
                            if let Ok(v) = text.parse::<f64>() {
                                if v > 0.0 {
                                    clock.tempo = v;
                                }
                            }
                        }
                        "duration" => {
                            if let Ok(v) = text.parse::<f64>() {
                                if let Some(n) = note.as_mut() {
                                    n.duration_divs = Some(v);
                                } else if let Some((divs, _)) = shift_divs.as_mut() {
                                    *divs = v;
                                }
                            }
                        }
                        "step" => {
                            if let Some(n) = note.as_mut() {
                                n.step = text.chars().next();
                            }
                        }
                        "alter" => {
                            if let (Some(n), Ok(v)) = (note.as_mut(), text.parse::<f64>()) {
                                n.alter = v.round() as i32;
                            }
                        }
                        "octave" => {
                            if let (Some(n), Ok(v)) = (note.as_mut(), text.parse::<i32>()) {
                                n.octave = Some(v);
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"note" => {
                    if let Some(pending) = note.take() {
                        finish_note(pending, &mut clock, &mut last_onset, velocity, &mut notes)?;
                    }
                }
                b"backup" | b"forward" => {
                    if let Some((divs, forward)) = shift_divs.take() {
                        let delta = clock.to_seconds(divs);
                        clock.seconds = if forward {
                            clock.seconds + delta
                        } else {
                            (clock.seconds - delta).max(0.0)
                        };
                    }
                }
                b"part" => in_part = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(CoachError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(notes)
}

fn apply_sound(e: &BytesStart, clock: &mut Clock, velocity: &mut f64) {
    if let Some(t) = attr_f64(e, b"tempo").filter(|t| *t > 0.0) {
        clock.tempo = t;
    }
    if let Some(d) = attr_f64(e, b"dynamics") {
        *velocity = (d / 100.0 * 0.9).clamp(0.0, 1.0);
    }
}

fn finish_note(
    pending: PendingNote,
    clock: &mut Clock,
    last_onset: &mut f64,
    velocity: f64,
    notes: &mut Vec<RawNote>,
) -> Result<()> {
    // Grace notes take no time in the written rhythm.
    if pending.is_grace {
        return Ok(());
    }
    let duration = clock.to_seconds(pending.duration_divs.unwrap_or(0.0));
    let onset = if pending.is_chord {
        *last_onset
    } else {
        clock.seconds
    };

    if !pending.is_rest {
        let step = pending.step.ok_or(CoachError::MissingPitch("step"))?;
        let octave = pending.octave.ok_or(CoachError::MissingPitch("octave"))?;
        let midi = midi_from_pitch(step, pending.alter, octave);

        let tied = pending.tie_stop
            && notes
                .last()
                .map(|prev| prev.midi_number == midi && (prev.time + prev.duration - onset).abs() < 1e-6)
                .unwrap_or(false);
        match notes.last_mut() {
            Some(prev) if tied => prev.duration += duration,
            _ => {
                if duration > 0.0 {
                    notes.push(RawNote {
                        midi_number: midi,
                        name: midi_to_name(midi),
                        time: onset,
                        duration,
                        velocity,
                    });
                }
            }
        }
    }

    if !pending.is_chord {
        *last_onset = onset;
        clock.seconds += duration;
    }
    Ok(())
}
