//! Clip decoding using symphonia.

use crate::playback::{PlaybackError, PlaybackResult};
use log::{debug, warn};
use std::fs::File;
use std::io;
use std::path::Path;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Fully decoded clip as interleaved `f32` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

impl DecodedClip {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }
}

/// Decodes the whole file at `path` into memory.
///
/// # Errors
/// - `Decode` when the file cannot be opened or probed, or has no audio track.
pub fn decode_file(path: &Path) -> PlaybackResult<DecodedClip> {
    let decode_err = |message: String| PlaybackError::Decode {
        path: path.to_path_buf(),
        message,
    };

    let file = File::open(path).map_err(|err| decode_err(format!("open failed: {err}")))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| decode_err(format!("unsupported format: {err}")))?;
    let mut format = probed.format;

    let (track_id, codec_params) = format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .map(|track| (track.id, track.codec_params.clone()))
        .ok_or_else(|| decode_err("no audio track found".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|err| decode_err(format!("unsupported codec: {err}")))?;

    let mut sample_rate = codec_params.sample_rate;
    let mut channels = codec_params.channels.map(|channels| channels.count());
    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(decode_err(format!("read failed: {err}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channels.get_or_insert(spec.channels.count());
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(message)) => {
                warn!(
                    "event=clip_decode module=audio status=warn path={} error={}",
                    path.display(),
                    message
                );
            }
            Err(err) => return Err(decode_err(format!("decode failed: {err}"))),
        }
    }

    let clip = DecodedClip {
        samples,
        sample_rate: sample_rate.ok_or_else(|| decode_err("sample rate unknown".to_string()))?,
        channels: channels.ok_or_else(|| decode_err("channel layout unknown".to_string()))?,
    };
    debug!(
        "event=clip_decode module=audio status=ok path={} frames={} sample_rate={} channels={}",
        path.display(),
        clip.frames(),
        clip.sample_rate,
        clip.channels
    );
    Ok(clip)
}
