use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoachError;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

/// Tolerance bands used by the note validator.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ValidationThresholds {
    /// Largest cents offset still scored as "close".
    pub pitch_tolerance_cents: f64,
    /// Largest cents offset scored as an exact pitch match.
    pub close_threshold_cents: f64,
    /// Allowed deviation of held/expected duration, as a fraction.
    pub duration_tolerance: f64,
    /// Audio level below which a sample counts as silence.
    pub silence_level: f64,
}

pub const DEFAULT_SILENCE_LEVEL: f64 = 0.05;

impl SkillLevel {
    pub fn thresholds(self) -> ValidationThresholds {
        let (pitch_tolerance_cents, close_threshold_cents, duration_tolerance) = match self {
            SkillLevel::Beginner => (50.0, 30.0, 0.30),
            SkillLevel::Intermediate => (30.0, 20.0, 0.20),
            SkillLevel::Advanced => (20.0, 10.0, 0.15),
        };
        ValidationThresholds {
            pitch_tolerance_cents,
            close_threshold_cents,
            duration_tolerance,
            silence_level: DEFAULT_SILENCE_LEVEL,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SkillLevel::Beginner => "beginner",
            SkillLevel::Intermediate => "intermediate",
            SkillLevel::Advanced => "advanced",
        }
    }
}

impl FromStr for SkillLevel {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(SkillLevel::Beginner),
            "intermediate" => Ok(SkillLevel::Intermediate),
            "advanced" => Ok(SkillLevel::Advanced),
            _ => Err(CoachError::UnknownSkillLevel(s.to_string())),
        }
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    /// Backing track runs regardless of what is played.
    #[default]
    Flow,
    /// Backing track waits for each note to be sustained.
    Wait,
}

impl PlayMode {
    pub fn toggled(self) -> Self {
        match self {
            PlayMode::Flow => PlayMode::Wait,
            PlayMode::Wait => PlayMode::Flow,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlayMode::Flow => "flow",
            PlayMode::Wait => "wait",
        }
    }
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayMode {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flow" => Ok(PlayMode::Flow),
            "wait" => Ok(PlayMode::Wait),
            _ => Err(CoachError::UnknownPlayMode(s.to_string())),
        }
    }
}

pub const DEFAULT_LEAD_IN_SECONDS: f64 = 2.0;
pub const DEFAULT_WAIT_HOLD_FRACTION: f64 = 0.8;

/// Per-session settings. Every field has a default so the UI may send a
/// partial object.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub skill_level: SkillLevel,
    pub play_mode: PlayMode,
    /// Transport playback rate, 1.0 = written tempo.
    pub tempo: f64,
    /// Fraction of a note's duration that must be held in wait mode.
    pub wait_hold_fraction: f64,
    /// Silent intro kept before the first note when building the timeline.
    pub lead_in_seconds: f64,
    /// Replaces the skill level's table when present.
    pub thresholds: Option<ValidationThresholds>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            skill_level: SkillLevel::default(),
            play_mode: PlayMode::default(),
            tempo: 1.0,
            wait_hold_fraction: DEFAULT_WAIT_HOLD_FRACTION,
            lead_in_seconds: DEFAULT_LEAD_IN_SECONDS,
            thresholds: None,
        }
    }
}

impl SessionConfig {
    pub fn effective_thresholds(&self) -> ValidationThresholds {
        self.thresholds
            .unwrap_or_else(|| self.skill_level.thresholds())
    }
}
