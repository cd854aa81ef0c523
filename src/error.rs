use std::io;

use thiserror::Error;

pub use crate::flv::DemuxError;
pub use crate::playlist::PlaylistError;
pub use crate::script::ScriptError;

/// Failures of the join engine.
#[derive(Debug, Error)]
pub enum JoinError {
    #[error(transparent)]
    Demux(#[from] DemuxError),

    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl JoinError {
    /// Whether the current input can be skipped and the run continued.
    pub fn is_recoverable(&self) -> bool {
        match self {
            JoinError::Demux(error) => error.is_recoverable(),
            JoinError::Output(_) => false,
        }
    }
}
