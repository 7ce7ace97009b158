//! Capture/playback capabilities consumed by the relay workers.
//!
//! The workers only see these traits; `alsa_device` provides the real
//! implementation and tests substitute scripted devices.

use super::format::AudioFormat;
use crate::error::RelayError;

/// A microphone-like device producing raw PCM in the relay format.
pub trait CaptureDevice: Send {
    /// Capacity of the device's internal buffer, in bytes.
    fn buffer_bytes(&self) -> usize;

    /// Blocking read of up to `buf.len()` bytes. `Ok(0)` means nothing was
    /// captured this time and is not an error.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, RelayError>;

    /// Throw away audio captured so far and keep capturing.
    fn discard(&mut self);

    /// Discard buffered audio and release the device. Idempotent.
    fn close(&mut self);
}

/// A speaker-like device consuming raw PCM in the relay format.
pub trait PlaybackDevice: Send {
    fn buffer_bytes(&self) -> usize;

    fn write(&mut self, data: &[u8]) -> Result<(), RelayError>;

    /// Flush pending audio and release the device. Idempotent.
    fn close(&mut self);
}

/// Opens devices on demand; each open hands exclusive ownership to a worker.
pub trait AudioDevices: Send + Sync {
    fn open_capture(&self, format: &AudioFormat) -> Result<Box<dyn CaptureDevice>, RelayError>;
    fn open_playback(&self, format: &AudioFormat) -> Result<Box<dyn PlaybackDevice>, RelayError>;
}
