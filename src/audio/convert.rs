//! Conversion of decoded audio into the relay format: channel mix-down,
//! streaming linear resampling and 16-bit quantization.

use super::format::AudioFormat;

/// Streaming linear-interpolation resampler for a single channel.
///
/// Keeps the last input sample of each chunk so interpolation is continuous
/// across chunk boundaries.
pub struct Resampler {
    step: f64,
    position: f64,
    history: Option<f32>,
    passthrough: bool,
}

impl Resampler {
    pub fn new(in_rate: u32, out_rate: u32) -> Self {
        Self {
            step: in_rate as f64 / out_rate as f64,
            position: 0.0,
            history: None,
            passthrough: in_rate == out_rate,
        }
    }

    /// Resample one chunk, appending the produced samples to `output`.
    pub fn process(&mut self, input: &[f32], output: &mut Vec<f32>) {
        if self.passthrough {
            output.extend_from_slice(input);
            return;
        }
        if input.is_empty() {
            return;
        }

        let mut combined = Vec::with_capacity(input.len() + 1);
        combined.extend(self.history);
        combined.extend_from_slice(input);

        while self.position + 1.0 < combined.len() as f64 {
            let index = self.position.floor() as usize;
            let frac = (self.position - index as f64) as f32;
            let a = combined[index];
            let b = combined[index + 1];
            output.push(a + (b - a) * frac);
            self.position += self.step;
        }

        // Re-base the position on the sample carried into the next chunk.
        self.position -= (combined.len() - 1) as f64;
        self.history = combined.last().copied();
    }
}

/// Turns interleaved float frames of any layout into relay-format bytes.
pub struct FormatConverter {
    in_channels: usize,
    resampler: Resampler,
    format: AudioFormat,
    mono: Vec<f32>,
    resampled: Vec<f32>,
}

impl FormatConverter {
    pub fn new(in_rate: u32, in_channels: usize, format: AudioFormat) -> Self {
        Self {
            in_channels: in_channels.max(1),
            resampler: Resampler::new(in_rate, format.sample_rate),
            format,
            mono: Vec::new(),
            resampled: Vec::new(),
        }
    }

    /// Convert one decoded chunk and append the encoded bytes to `out`.
    pub fn convert(&mut self, interleaved: &[f32], out: &mut Vec<u8>) {
        self.mono.clear();
        self.mono.extend(
            interleaved
                .chunks_exact(self.in_channels)
                .map(|frame| frame.iter().sum::<f32>() / self.in_channels as f32),
        );

        self.resampled.clear();
        self.resampler.process(&self.mono, &mut self.resampled);

        out.reserve(self.resampled.len() * self.format.frame_size());
        for &sample in &self.resampled {
            let quantized = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            for _ in 0..self.format.channels {
                out.extend_from_slice(&self.format.sample_bytes(quantized));
            }
        }
    }
}
