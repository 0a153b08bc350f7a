//! Lifecycle wrapper tying a controller to its pitch source and transport.

use tracing::info;

use crate::error::Result;
use crate::pitch::{PitchSample, PitchSource};
use crate::playback::controller::{PlaybackController, Tick, TickOutcome};
use crate::playback::transport::Transport;

/// Owns one play-along session. The pitch source is acquired by
/// [`PracticeSession::start`] and released by [`PracticeSession::stop`] or,
/// failing that, when the session is dropped. Ticks outside that window do
/// not touch the controller.
pub struct PracticeSession<P: PitchSource, T: Transport> {
    controller: PlaybackController,
    pitch: P,
    transport: T,
    active: bool,
}

impl<P: PitchSource, T: Transport> PracticeSession<P, T> {
    pub fn new(controller: PlaybackController, pitch: P, transport: T) -> Self {
        PracticeSession {
            controller,
            pitch,
            transport,
            active: false,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.active {
            return Ok(());
        }
        self.pitch.start()?;
        self.active = true;
        info!("Practice session started");
        Ok(())
    }

    /// Releases the pitch source and pauses playback.
    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.pitch.stop();
        self.controller.pause(&mut self.transport);
        info!("Practice session stopped");
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Polls the pitch source and the transport position and runs one
    /// controller tick. `clock` is a monotonic time in seconds.
    pub fn tick(&mut self, clock: f64) -> Option<TickOutcome> {
        let sample = self.pitch.current_sample();
        self.tick_with_sample(clock, &sample)
    }

    /// Same as [`PracticeSession::tick`] with a sample detected elsewhere.
    pub fn tick_with_sample(&mut self, clock: f64, sample: &PitchSample) -> Option<TickOutcome> {
        if !self.active {
            return None;
        }
        let position = self.transport.current_time();
        Some(
            self.controller
                .tick(Tick::new(position, clock), sample, &mut self.transport),
        )
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    /// Controller together with the transport it drives.
    pub fn controls(&mut self) -> (&mut PlaybackController, &mut T) {
        (&mut self.controller, &mut self.transport)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn pitch_source(&self) -> &P {
        &self.pitch
    }

    pub fn pitch_source_mut(&mut self) -> &mut P {
        &mut self.pitch
    }
}

impl<P: PitchSource, T: Transport> Drop for PracticeSession<P, T> {
    fn drop(&mut self) {
        if self.active {
            self.active = false;
            self.pitch.stop();
            info!("Practice session dropped, pitch source released");
        }
    }
}
