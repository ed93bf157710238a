use thiserror::Error;

use crate::types::FocusRequestResult;

#[derive(Error, Debug)]
pub enum AudioRouteError {
    #[error("Audio platform call failed: {0}")]
    Platform(String),

    #[error("Hardware listener not registered")]
    NotRegistered,

    #[error("Audio focus not granted ({0:?})")]
    FocusDenied(FocusRequestResult),

    #[error("Audio device module already released")]
    Released,

    #[error("Failed to create audio device module: {0}")]
    ModuleCreation(String),

    #[error("Failed to emit {name}: {reason}")]
    Emit { name: String, reason: String },

    #[error("Event encoding error: {0}")]
    Protocol(#[from] webrtc_audio_protocol::ProtocolError),
}

pub type AudioRouteResult<T> = Result<T, AudioRouteError>;
