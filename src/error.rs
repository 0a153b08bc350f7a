use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoachError {
    #[error("Unknown skill level: {0}")]
    UnknownSkillLevel(String),

    #[error("Unknown play mode: {0}")]
    UnknownPlayMode(String),

    #[error("Invalid note: {0}")]
    InvalidNote(String),

    #[error("No finalized result for note {0}")]
    NoteResultNotFound(usize),

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("Missing pitch {0}")]
    MissingPitch(&'static str),

    #[error("Pitch source failed: {0}")]
    PitchSource(String),
}

pub type Result<T> = std::result::Result<T, CoachError>;
