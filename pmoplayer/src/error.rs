use pmocast::CastError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("cast target error: {0}")]
    Cast(#[from] CastError),
    #[error("audio engine error: {0}")]
    Engine(String),
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
    #[error("target switch failed: {0}")]
    Switch(String),
    #[error("no playback target attached")]
    NoTarget,
}

pub type Result<T> = std::result::Result<T, PlayerError>;
