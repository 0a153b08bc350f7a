//! The audio element / score renderer the controller drives.

use serde::Serialize;

pub trait Transport {
    fn play(&mut self);
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    /// Playback position in seconds.
    fn current_time(&self) -> f64;
    fn seek(&mut self, time: f64);
    fn set_playback_rate(&mut self, rate: f64);
    /// Highlight a note in the rendered score, `None` clears it.
    fn highlight_note(&mut self, _index: Option<usize>) {}
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportCommand {
    Play,
    Pause,
    Seek { time: f64 },
    SetPlaybackRate { rate: f64 },
    Highlight { index: Option<usize> },
}

/// Mirror of a browser audio element. The host syncs it from the real
/// element before each tick and applies the queued commands afterwards.
#[derive(Clone, Debug)]
pub struct CommandTransport {
    paused: bool,
    position: f64,
    rate: f64,
    commands: Vec<TransportCommand>,
}

impl Default for CommandTransport {
    fn default() -> Self {
        CommandTransport {
            paused: true,
            position: 0.0,
            rate: 1.0,
            commands: Vec::new(),
        }
    }
}

impl CommandTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync(&mut self, position: f64, paused: bool) {
        self.position = position;
        self.paused = paused;
    }

    pub fn playback_rate(&self) -> f64 {
        self.rate
    }

    pub fn pending(&self) -> &[TransportCommand] {
        &self.commands
    }

    pub fn drain_commands(&mut self) -> Vec<TransportCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl Transport for CommandTransport {
    fn play(&mut self) {
        self.paused = false;
        self.commands.push(TransportCommand::Play);
    }

    fn pause(&mut self) {
        self.paused = true;
        self.commands.push(TransportCommand::Pause);
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn seek(&mut self, time: f64) {
        self.position = time;
        self.commands.push(TransportCommand::Seek { time });
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.rate = rate;
        self.commands.push(TransportCommand::SetPlaybackRate { rate });
    }

    fn highlight_note(&mut self, index: Option<usize>) {
        self.commands.push(TransportCommand::Highlight { index });
    }
}
