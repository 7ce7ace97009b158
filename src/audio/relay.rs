//! The two audio workers behind one start/stop lifecycle.

use std::path::Path;
use std::sync::Arc;

use super::device::AudioDevices;
use super::format::AUDIO_FORMAT;
#[cfg(test)]
use super::mode::OutgoingAudioMode;
use super::outgoing::OutgoingAudio;
use super::speaker::SpeakerRelay;
use crate::state_machine::RelayWorkerState;

/// Outgoing-audio switches driven by the control loop.
pub trait AudioControls: Send + Sync {
    fn request_play_file(&self, path: &Path);
    fn request_stop_file(&self);
    fn request_microphone(&self);
    fn request_stop_microphone(&self);
    fn set_streaming_delay(&self, ms: u64);
}

pub struct AudioRelay {
    speaker: SpeakerRelay,
    outgoing: OutgoingAudio,
}

impl AudioRelay {
    pub fn new(
        remote_host: &str,
        send_port: u16,
        receive_port: u16,
        devices: Arc<dyn AudioDevices>,
        delay_ms: u64,
    ) -> Self {
        Self {
            speaker: SpeakerRelay::new(receive_port, AUDIO_FORMAT, devices.clone()),
            outgoing: OutgoingAudio::new(remote_host, send_port, AUDIO_FORMAT, devices, delay_ms),
        }
    }

    /// Start the speaker then the outgoing worker. A worker that fails to
    /// start is logged and left stopped; the other one still runs.
    pub fn start(&self) {
        if let Err(e) = self.speaker.start() {
            log::error!("Speaker relay failed to start: {}", e);
        }
        if let Err(e) = self.outgoing.start() {
            log::error!("Outgoing audio failed to start: {}", e);
        }
    }

    pub fn stop(&self) {
        self.speaker.stop();
        self.outgoing.stop();
    }

    /// (speaker, outgoing)
    pub fn states(&self) -> (RelayWorkerState, RelayWorkerState) {
        (self.speaker.state(), self.outgoing.state())
    }

    #[cfg(test)]
    pub fn speaker(&self) -> &SpeakerRelay {
        &self.speaker
    }

    #[cfg(test)]
    pub fn outgoing(&self) -> &OutgoingAudio {
        &self.outgoing
    }

    #[cfg(test)]
    pub fn mode(&self) -> OutgoingAudioMode {
        self.outgoing.mode()
    }
}

impl AudioControls for AudioRelay {
    fn request_play_file(&self, path: &Path) {
        self.outgoing.request_play_file(path);
    }

    fn request_stop_file(&self) {
        self.outgoing.request_stop_file();
    }

    fn request_microphone(&self) {
        self.outgoing.request_microphone();
    }

    fn request_stop_microphone(&self) {
        self.outgoing.request_stop_microphone();
    }

    fn set_streaming_delay(&self, ms: u64) {
        self.outgoing.set_streaming_delay(ms);
    }
}

impl Drop for AudioRelay {
    fn drop(&mut self) {
        self.stop();
    }
}
