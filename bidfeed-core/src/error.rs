use thiserror::Error;

use crate::message::Watermark;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Source Error - {0}")]
    Source(String),

    #[error("Resume point {resume_from} predates retained history starting at {retained_from}")]
    ResumeExpired {
        resume_from: Watermark,
        retained_from: Watermark,
    },

    #[error("Checkpoint Read Error - {0}")]
    CheckpointRead(String),

    #[error("Checkpoint Write Error - {0}")]
    CheckpointWrite(String),

    #[error("Malformed Record - {0}")]
    MalformedRecord(String),

    #[error("Config Error - {0}")]
    Config(String),

    #[error("Forwarder Error - {0}")]
    Forwarder(String),

    #[error("Actor task terminated - {0}")]
    ActorTaskTerminated(String),
}
