//! Scripted audio devices for worker tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::device::{AudioDevices, CaptureDevice, PlaybackDevice};
use super::format::AudioFormat;
use crate::error::RelayError;

pub struct MockDevices {
    buffer_bytes: usize,
    capture_fill: Option<u8>,
    capture_available: bool,
    playback_available: bool,
    played: Arc<Mutex<Vec<Vec<u8>>>>,
    capture_closed: Arc<AtomicBool>,
    capture_discards: Arc<AtomicUsize>,
    capture_gate: Mutex<Option<Receiver<()>>>,
    playback_closed: Arc<AtomicBool>,
}

impl MockDevices {
    /// Devices whose capture reads return nothing.
    pub fn new(buffer_bytes: usize) -> Self {
        Self {
            buffer_bytes,
            capture_fill: None,
            capture_available: true,
            playback_available: true,
            played: Arc::new(Mutex::new(Vec::new())),
            capture_closed: Arc::new(AtomicBool::new(false)),
            capture_discards: Arc::new(AtomicUsize::new(0)),
            capture_gate: Mutex::new(None),
            playback_closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Capture reads fill the whole buffer with `byte`.
    pub fn capturing(mut self, byte: u8) -> Self {
        self.capture_fill = Some(byte);
        self
    }

    /// Each capture read blocks until the returned sender releases it (or is
    /// dropped).
    pub fn gated(self) -> (Self, Sender<()>) {
        let (tx, rx) = mpsc::channel();
        *self.capture_gate.lock().unwrap() = Some(rx);
        (self, tx)
    }

    pub fn without_capture(mut self) -> Self {
        self.capture_available = false;
        self
    }

    pub fn without_playback(mut self) -> Self {
        self.playback_available = false;
        self
    }

    pub fn played(&self) -> Vec<Vec<u8>> {
        self.played.lock().unwrap().clone()
    }

    pub fn capture_closed(&self) -> bool {
        self.capture_closed.load(Ordering::SeqCst)
    }

    pub fn capture_discards(&self) -> usize {
        self.capture_discards.load(Ordering::SeqCst)
    }

    pub fn playback_closed(&self) -> bool {
        self.playback_closed.load(Ordering::SeqCst)
    }
}

impl AudioDevices for MockDevices {
    fn open_capture(&self, _format: &AudioFormat) -> Result<Box<dyn CaptureDevice>, RelayError> {
        if !self.capture_available {
            return Err(RelayError::DeviceUnavailable("no microphone".into()));
        }
        self.capture_closed.store(false, Ordering::SeqCst);
        Ok(Box::new(MockCapture {
            buffer_bytes: self.buffer_bytes,
            fill: self.capture_fill,
            gate: self.capture_gate.lock().unwrap().take(),
            closed: self.capture_closed.clone(),
            discards: self.capture_discards.clone(),
        }))
    }

    fn open_playback(&self, _format: &AudioFormat) -> Result<Box<dyn PlaybackDevice>, RelayError> {
        if !self.playback_available {
            return Err(RelayError::DeviceUnavailable("no speaker".into()));
        }
        self.playback_closed.store(false, Ordering::SeqCst);
        Ok(Box::new(MockPlayback {
            buffer_bytes: self.buffer_bytes,
            played: self.played.clone(),
            closed: self.playback_closed.clone(),
        }))
    }
}

struct MockCapture {
    buffer_bytes: usize,
    fill: Option<u8>,
    gate: Option<Receiver<()>>,
    closed: Arc<AtomicBool>,
    discards: Arc<AtomicUsize>,
}

impl CaptureDevice for MockCapture {
    fn buffer_bytes(&self) -> usize {
        self.buffer_bytes
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, RelayError> {
        // Real capture blocks for about a period.
        match &self.gate {
            Some(gate) if gate.recv().is_ok() => {}
            _ => thread::sleep(Duration::from_millis(5)),
        }
        match self.fill {
            Some(byte) => {
                buf.fill(byte);
                Ok(buf.len())
            }
            None => Ok(0),
        }
    }

    fn discard(&mut self) {
        self.discards.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct MockPlayback {
    buffer_bytes: usize,
    played: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

impl PlaybackDevice for MockPlayback {
    fn buffer_bytes(&self) -> usize {
        self.buffer_bytes
    }

    fn write(&mut self, data: &[u8]) -> Result<(), RelayError> {
        self.played.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
