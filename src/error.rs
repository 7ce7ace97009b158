//! Error types for the audio relay and the control-frame codec

use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the audio relay workers and their collaborators.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The capture or playback device could not be opened. Fatal to the
    /// worker that tried to open it.
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Audio device I/O failed: {0}")]
    DeviceIo(String),

    #[error("Socket error: {0}")]
    Socket(#[from] std::io::Error),

    #[error("Unsupported audio file {path:?}: {reason}")]
    UnsupportedFile { path: PathBuf, reason: String },

    #[error("Audio file read failed: {0}")]
    FileRead(String),

    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
}

/// Control-frame decoding errors
#[cfg(test)]
#[derive(Error, Debug, PartialEq)]
pub enum FrameError {
    #[error("Missing frame terminator")]
    MissingTerminator,

    #[error("Expected 6 fields, found {0}")]
    FieldCount(usize),

    #[error("Invalid field value: {0}")]
    InvalidField(String),
}
