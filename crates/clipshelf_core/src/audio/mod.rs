//! Audio decoding, transforms and device output.
//!
//! # Responsibility
//! - Decode archive files to PCM (symphonia).
//! - Apply speed/volume/reverse transforms and match the device layout.
//! - Stream rendered clips to an output device (cpal, `device-output`).

pub mod decode;
#[cfg(feature = "device-output")]
mod output;
pub mod transform;

pub use decode::{decode_file, DecodedClip};
#[cfg(feature = "device-output")]
pub use output::DeviceBackend;
