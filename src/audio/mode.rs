//! Arbitration between the outgoing audio sources.
//!
//! File playback and the microphone are mutually exclusive. The active file
//! session lives inside the `File` variant, so leaving file mode closes it.

use super::file_stream::FileAudioSession;

/// What the outgoing worker is currently sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutgoingAudioMode {
    Idle,
    File,
    Microphone,
}

/// The outgoing source together with the resources it owns.
pub enum Source {
    Idle,
    File(FileAudioSession),
    Microphone,
}

/// A mode switch issued by the control loop.
pub enum ModeRequest {
    PlayFile(FileAudioSession),
    StopFile,
    Microphone,
    StopMicrophone,
}

impl Source {
    pub fn mode(&self) -> OutgoingAudioMode {
        match self {
            Source::Idle => OutgoingAudioMode::Idle,
            Source::File(_) => OutgoingAudioMode::File,
            Source::Microphone => OutgoingAudioMode::Microphone,
        }
    }
}

/// Apply a request to the current source. Requests that do not apply to the
/// current mode leave it untouched; a file already playing is never replaced.
pub fn transition(current: Source, request: ModeRequest) -> Source {
    match (current, request) {
        (file @ Source::File(_), ModeRequest::PlayFile(_)) => file,
        (_, ModeRequest::PlayFile(session)) => Source::File(session),
        (Source::File(_), ModeRequest::StopFile) => Source::Idle,
        (_, ModeRequest::Microphone) => Source::Microphone,
        (Source::Microphone, ModeRequest::StopMicrophone) => Source::Idle,
        (current, _) => current,
    }
}
