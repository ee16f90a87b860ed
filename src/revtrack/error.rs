use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RevtrackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not tracked: {0}")]
    NotTracked(String),

    #[error("No tracking header in {}", .0.display())]
    NoHeader(PathBuf),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("A watcher is already running for this folder (pid {pid})")]
    AlreadyRunning { pid: u32 },
}

impl From<notify::Error> for RevtrackError {
    fn from(err: notify::Error) -> Self {
        RevtrackError::Watcher(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RevtrackError>;
