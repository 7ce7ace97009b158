//! The single PCM format used by both relay directions and by file playback.

/// Immutable description of the relay's PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
    pub big_endian: bool,
}

/// 44.1 kHz, signed 16-bit, mono, big-endian.
pub const AUDIO_FORMAT: AudioFormat = AudioFormat {
    sample_rate: 44_100,
    bits_per_sample: 16,
    channels: 1,
    big_endian: true,
};

/// The device buffer is split into this many packets' worth of audio.
const DEVICE_BUFFER_DIVISOR: usize = 8;

/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM_PAYLOAD: usize = 65_507;

impl AudioFormat {
    /// Bytes per frame (one sample for every channel).
    pub fn frame_size(&self) -> usize {
        (self.bits_per_sample as usize / 8) * self.channels as usize
    }

    /// Size of one packet's payload for a device whose internal buffer holds
    /// `device_buffer_bytes`: an eighth of the buffer, expressed in frames and
    /// scaled by the frame size. Never zero, and never more whole frames than
    /// fit in one datagram.
    pub fn frame_buffer_len(&self, device_buffer_bytes: usize) -> usize {
        let frame_size = self.frame_size();
        let frames = device_buffer_bytes / DEVICE_BUFFER_DIVISOR;
        let cap = (MAX_DATAGRAM_PAYLOAD / frame_size) * frame_size;
        (frames * frame_size).clamp(frame_size, cap)
    }

    /// Serialize one sample in this format's byte order.
    pub fn sample_bytes(&self, sample: i16) -> [u8; 2] {
        if self.big_endian {
            sample.to_be_bytes()
        } else {
            sample.to_le_bytes()
        }
    }
}
