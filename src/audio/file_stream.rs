//! Decoded sound-effect file, converted on the fly into the relay format.

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::convert::FormatConverter;
use super::format::AudioFormat;
use crate::error::RelayError;

/// An open file being streamed as relay-format bytes.
///
/// Only exists while the outgoing worker is in file mode; dropping it closes
/// the decoder and the underlying file.
pub struct FileAudioSession {
    path: PathBuf,
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    converter: FormatConverter,
    pending: Vec<u8>,
    finished: bool,
}

impl FileAudioSession {
    pub fn open(path: &Path, format: &AudioFormat) -> Result<Self, RelayError> {
        let unsupported = |reason: String| RelayError::UnsupportedFile {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| unsupported(e.to_string()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| unsupported(e.to_string()))?;
        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| unsupported("no audio track".into()))?;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| unsupported("unknown sample rate".into()))?;
        let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);
        let track_id = track.id;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| unsupported(e.to_string()))?;

        log::info!(
            "Opened {} ({} Hz, {} ch) for streaming",
            path.display(),
            sample_rate,
            channels
        );

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            decoder,
            track_id,
            converter: FormatConverter::new(sample_rate, channels, *format),
            pending: Vec::new(),
            finished: false,
        })
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fill `buf` with converted bytes. Returns fewer than `buf.len()` bytes
    /// only at the end of the stream, and `Ok(0)` once it is exhausted.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, RelayError> {
        while self.pending.len() < buf.len() && !self.finished {
            self.decode_next()?;
        }

        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    fn decode_next(&mut self) -> Result<(), RelayError> {
        let packet = match self.reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.finished = true;
                return Ok(());
            }
            Err(SymphoniaError::ResetRequired) => {
                self.finished = true;
                return Ok(());
            }
            Err(e) => return Err(RelayError::FileRead(e.to_string())),
        };

        if packet.track_id() != self.track_id {
            return Ok(());
        }

        match self.decoder.decode(&packet) {
            Ok(decoded) => {
                let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
                samples.copy_interleaved_ref(decoded);
                self.converter.convert(samples.samples(), &mut self.pending);
            }
            // 损坏的包直接跳过
            Err(SymphoniaError::DecodeError(e)) => {
                log::debug!("Skipping undecodable packet in {}: {}", self.path.display(), e);
            }
            Err(e) => return Err(RelayError::FileRead(e.to_string())),
        }
        Ok(())
    }
}
