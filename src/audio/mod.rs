//! audio - Two-way raw PCM relay between the operator station and the puppet
//!
//! The speaker worker plays what the puppet sends; the outgoing worker sends
//! either the microphone or a paced sound-effect file. ALSA provides the
//! devices and symphonia decodes the sound files.

pub mod alsa_device;
pub mod convert;
pub mod device;
pub mod file_stream;
pub mod format;
pub mod mode;
pub mod outgoing;
pub mod relay;
pub mod speaker;

#[cfg(test)]
pub(crate) mod mock;

pub use alsa_device::AlsaDevices;
pub use relay::{AudioControls, AudioRelay};
