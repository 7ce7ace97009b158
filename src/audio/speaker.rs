//! Incoming audio: datagrams from the puppet are written verbatim to the
//! local playback device.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::device::{AudioDevices, PlaybackDevice};
use super::format::AudioFormat;
use crate::error::RelayError;
use crate::state_machine::{RelayWorkerState, RunFlag};
use crate::transport::ReceiveTransport;

/// How often a blocked receive wakes up to check for a stop request.
const RECEIVE_POLL: Duration = Duration::from_millis(250);
const ERROR_BACKOFF: Duration = Duration::from_millis(500);

pub struct SpeakerRelay {
    receive_port: u16,
    format: AudioFormat,
    devices: Arc<dyn AudioDevices>,
    flag: Arc<RunFlag>,
    bound_port: Arc<AtomicU16>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SpeakerRelay {
    pub fn new(receive_port: u16, format: AudioFormat, devices: Arc<dyn AudioDevices>) -> Self {
        Self {
            receive_port,
            format,
            devices,
            flag: Arc::new(RunFlag::new()),
            bound_port: Arc::new(AtomicU16::new(0)),
            worker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> RelayWorkerState {
        self.flag.state()
    }

    /// Local port actually bound while running; 0 when stopped.
    #[cfg(test)]
    pub fn local_port(&self) -> u16 {
        self.bound_port.load(Ordering::Relaxed)
    }

    /// Tear down any previous run, then bind the socket, open playback and
    /// start the relay thread. A playback device that cannot be opened leaves
    /// the worker stopped.
    pub fn start(&self) -> Result<(), RelayError> {
        self.stop();

        let transport = ReceiveTransport::bind(self.receive_port, RECEIVE_POLL)?;
        let playback = self.devices.open_playback(&self.format)?;
        let buffer = vec![0u8; self.format.frame_buffer_len(playback.buffer_bytes())];
        let port = transport.local_port()?;

        log::info!(
            "Speaker relay listening on port {} ({} byte packets)",
            port,
            buffer.len()
        );

        self.flag.start();
        self.bound_port.store(port, Ordering::Relaxed);

        let flag = self.flag.clone();
        let bound_port = self.bound_port.clone();
        let spawned = thread::Builder::new()
            .name("audio-speaker".into())
            .spawn(move || {
                relay_loop(&flag, &transport, playback, buffer);
                bound_port.store(0, Ordering::Relaxed);
                log::info!("Speaker relay stopped");
            });

        match spawned {
            Ok(handle) => {
                *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.flag.stop();
                self.bound_port.store(0, Ordering::Relaxed);
                Err(RelayError::ThreadSpawn(e))
            }
        }
    }

    /// Stop the relay thread and release socket and device. Idempotent.
    pub fn stop(&self) {
        self.flag.stop();
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Speaker relay thread panicked");
            }
        }
    }
}

fn relay_loop(
    flag: &RunFlag,
    transport: &ReceiveTransport,
    mut playback: Box<dyn PlaybackDevice>,
    mut buffer: Vec<u8>,
) {
    while flag.is_running() {
        match transport.recv(&mut buffer) {
            Ok(Some(0)) | Ok(None) => {}
            Ok(Some(len)) => {
                if let Err(e) = playback.write(&buffer[..len]) {
                    log::warn!("Speaker playback failed: {}", e);
                }
            }
            Err(e) => {
                log::warn!("Speaker receive failed: {}", e);
                flag.sleep(ERROR_BACKOFF);
            }
        }
    }
    playback.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::AUDIO_FORMAT;
    use crate::audio::mock::MockDevices;
    use std::net::UdpSocket;
    use std::time::Instant;

    fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn received_datagrams_are_played_verbatim() {
        let devices = Arc::new(MockDevices::new(800));
        let speaker = SpeakerRelay::new(0, AUDIO_FORMAT, devices.clone());
        speaker.start().unwrap();
        assert_eq!(speaker.state(), RelayWorkerState::Running);

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender
            .send_to(&[9, 8, 7, 6], ("127.0.0.1", speaker.local_port()))
            .unwrap();

        assert!(wait_for(|| !devices.played().is_empty()));
        assert_eq!(devices.played()[0], vec![9, 8, 7, 6]);

        speaker.stop();
        assert_eq!(speaker.state(), RelayWorkerState::Stopped);
        assert!(devices.playback_closed());
    }

    #[test]
    fn playback_open_failure_leaves_worker_stopped() {
        let devices = Arc::new(MockDevices::new(800).without_playback());
        let speaker = SpeakerRelay::new(0, AUDIO_FORMAT, devices);

        let result = speaker.start();
        assert!(matches!(result, Err(RelayError::DeviceUnavailable(_))));
        assert_eq!(speaker.state(), RelayWorkerState::Stopped);
    }

    #[test]
    fn stop_is_idempotent_and_prompt() {
        let devices = Arc::new(MockDevices::new(800));
        let speaker = SpeakerRelay::new(0, AUDIO_FORMAT, devices);
        speaker.stop();

        speaker.start().unwrap();
        let begun = Instant::now();
        speaker.stop();
        speaker.stop();
        assert!(begun.elapsed() < Duration::from_secs(1));
        assert_eq!(speaker.local_port(), 0);
    }
}
