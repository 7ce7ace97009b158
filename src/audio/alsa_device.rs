//! ALSA PCM device wrappers for audio capture and playback.

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};

use super::device::{AudioDevices, CaptureDevice, PlaybackDevice};
use super::format::AudioFormat;
use crate::error::RelayError;

/// Consecutive failed recoveries after which the rest of a write is dropped.
const MAX_WRITE_RECOVERIES: u32 = 3;

/// Requested ring buffer length in microseconds.
const BUFFER_TIME_US: u32 = 500_000;

/// Parameters negotiated with the ALSA hardware.
#[derive(Debug, Clone)]
pub struct AlsaParams {
    pub sample_rate: u32,
    pub channels: u32,
    /// Period size in frames
    pub period_size: usize,
    /// Ring buffer size in frames
    pub buffer_size: usize,
}

/// Opens the configured ALSA devices in the relay format.
pub struct AlsaDevices {
    capture_device: String,
    playback_device: String,
}

impl AlsaDevices {
    pub fn new(capture_device: &str, playback_device: &str) -> Self {
        Self {
            capture_device: capture_device.to_string(),
            playback_device: playback_device.to_string(),
        }
    }
}

impl AudioDevices for AlsaDevices {
    fn open_capture(&self, format: &AudioFormat) -> Result<Box<dyn CaptureDevice>, RelayError> {
        let (pcm, params) = open_pcm(&self.capture_device, Direction::Capture, format, "Capture")
            .map_err(|e| RelayError::DeviceUnavailable(e.to_string()))?;
        pcm.start()
            .map_err(|e| RelayError::DeviceUnavailable(format!("Failed to start capture: {}", e)))?;
        Ok(Box::new(AlsaCapture {
            pcm: Some(pcm),
            frame_size: format.frame_size(),
            buffer_bytes: params.buffer_size * format.frame_size(),
        }))
    }

    fn open_playback(&self, format: &AudioFormat) -> Result<Box<dyn PlaybackDevice>, RelayError> {
        let (pcm, params) = open_pcm(&self.playback_device, Direction::Playback, format, "Playback")
            .map_err(|e| RelayError::DeviceUnavailable(e.to_string()))?;
        Ok(Box::new(AlsaPlayback {
            pcm: Some(pcm),
            frame_size: format.frame_size(),
            buffer_bytes: params.buffer_size * format.frame_size(),
        }))
    }
}

fn open_pcm(
    device: &str,
    direction: Direction,
    format: &AudioFormat,
    dir_name: &str,
) -> anyhow::Result<(PCM, AlsaParams)> {
    use anyhow::Context;

    let pcm = PCM::new(device, direction, false)
        .with_context(|| format!("Failed to open PCM device '{}' for {}", device, dir_name))?;

    // Configure hardware parameters
    {
        let hwp = HwParams::any(&pcm).with_context(|| "Failed to initialize HwParams")?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(if format.big_endian { Format::S16BE } else { Format::S16LE })?;
        hwp.set_channels(format.channels as u32)?;
        hwp.set_rate(format.sample_rate, ValueOr::Nearest)
            .with_context(|| format!("{} Hz not supported by '{}'", format.sample_rate, device))?;
        hwp.set_buffer_time_near(BUFFER_TIME_US, ValueOr::Nearest)
            .with_context(|| format!("Failed to set buffer time on '{}'", device))?;
        pcm.hw_params(&hwp)?;
    }

    // Read back actual negotiated parameters
    let params = {
        let hwp = pcm.hw_params_current()?;
        AlsaParams {
            sample_rate: hwp.get_rate()?,
            channels: hwp.get_channels()?,
            period_size: hwp.get_period_size()? as usize,
            buffer_size: hwp.get_buffer_size()? as usize,
        }
    };

    if params.sample_rate != format.sample_rate || params.channels != format.channels as u32 {
        anyhow::bail!(
            "'{}' negotiated {} Hz / {} ch, relay needs {} Hz / {} ch",
            device,
            params.sample_rate,
            params.channels,
            format.sample_rate,
            format.channels,
        );
    }

    log::info!(
        "ALSA {}: device={}, rate={}, channels={}, period_size={}, buffer_size={}",
        dir_name,
        device,
        params.sample_rate,
        params.channels,
        params.period_size,
        params.buffer_size,
    );

    Ok((pcm, params))
}

pub struct AlsaCapture {
    pcm: Option<PCM>,
    frame_size: usize,
    buffer_bytes: usize,
}

impl CaptureDevice for AlsaCapture {
    fn buffer_bytes(&self) -> usize {
        self.buffer_bytes
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, RelayError> {
        let pcm = self
            .pcm
            .as_ref()
            .ok_or_else(|| RelayError::DeviceIo("capture device closed".into()))?;

        match pcm.io_bytes().readi(buf) {
            Ok(frames) => Ok(frames * self.frame_size),
            Err(e) => {
                // Overruns are expected after idling; recover and report nothing read.
                log::warn!("ALSA capture error: {}, recovering...", e);
                pcm.prepare()
                    .map_err(|e2| RelayError::DeviceIo(format!("Failed to recover PCM capture: {}", e2)))?;
                Ok(0)
            }
        }
    }

    fn discard(&mut self) {
        let Some(pcm) = self.pcm.as_ref() else {
            return;
        };
        // 丢弃空闲期间积压的采样，重新开始采集
        let restarted = PCM::drop(pcm)
            .and_then(|_| pcm.prepare())
            .and_then(|_| pcm.start());
        if let Err(e) = restarted {
            log::warn!("ALSA capture restart failed: {}", e);
        }
    }

    fn close(&mut self) {
        if let Some(pcm) = self.pcm.take() {
            if let Err(e) = PCM::drop(&pcm) {
                log::debug!("ALSA capture drop: {}", e);
            }
        }
    }
}

impl Drop for AlsaCapture {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct AlsaPlayback {
    pcm: Option<PCM>,
    frame_size: usize,
    buffer_bytes: usize,
}

impl PlaybackDevice for AlsaPlayback {
    fn buffer_bytes(&self) -> usize {
        self.buffer_bytes
    }

    fn write(&mut self, data: &[u8]) -> Result<(), RelayError> {
        let pcm = self
            .pcm
            .as_ref()
            .ok_or_else(|| RelayError::DeviceIo("playback device closed".into()))?;
        let io = pcm.io_bytes();

        // A trailing partial frame cannot be played.
        let total_frames = data.len() / self.frame_size;
        let mut frames_written = 0;
        let mut retry_count = 0u32;

        while frames_written < total_frames {
            let offset = frames_written * self.frame_size;
            match io.writei(&data[offset..total_frames * self.frame_size]) {
                Ok(n) => {
                    frames_written += n;
                    retry_count = 0;
                }
                Err(e) => {
                    log::warn!("ALSA XRUN or error: {}, recovering...", e);
                    retry_count += 1;

                    pcm.prepare().map_err(|e2| {
                        RelayError::DeviceIo(format!("Failed to recover PCM playback: {}", e2))
                    })?;

                    if retry_count >= MAX_WRITE_RECOVERIES {
                        log::error!(
                            "Max recovery retries ({}) reached. Dropping {} unwritten frames.",
                            retry_count,
                            total_frames - frames_written
                        );
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(pcm) = self.pcm.take() {
            if let Err(e) = pcm.drain() {
                log::debug!("ALSA playback drain: {}", e);
            }
        }
    }
}

impl Drop for AlsaPlayback {
    fn drop(&mut self) {
        self.close();
    }
}
