//! Per-call sample transforms: reverse, gain, speed/resample, channel map.
//!
//! All functions operate on interleaved `f32` samples.

use super::decode::DecodedClip;
use crate::playback::{PlaybackError, PlaybackOptions, PlaybackResult};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Applies `options` and converts `clip` to the device layout.
///
/// Speed is folded into the resampling ratio, so a faster clip is shorter
/// and higher pitched.
pub fn render_clip(
    clip: DecodedClip,
    options: &PlaybackOptions,
    device_rate: u32,
    device_channels: usize,
) -> PlaybackResult<Vec<f32>> {
    let DecodedClip {
        mut samples,
        sample_rate,
        channels,
    } = clip;
    if samples.is_empty() || channels == 0 || device_channels == 0 {
        return Ok(Vec::new());
    }

    if options.reverse {
        reverse_frames(&mut samples, channels);
    }
    apply_gain(&mut samples, options.volume);

    let ratio = f64::from(device_rate) / (f64::from(sample_rate) * f64::from(options.speed));
    let resampled = resample(&samples, channels, ratio)?;
    Ok(remap_channels(&resampled, channels, device_channels))
}

/// Reverses frame order while keeping channel order inside each frame.
pub fn reverse_frames(samples: &mut [f32], channels: usize) {
    if channels == 0 {
        return;
    }
    samples.reverse();
    for frame in samples.chunks_exact_mut(channels) {
        frame.reverse();
    }
}

/// Scales every sample by `volume`, clamping to the valid range.
pub fn apply_gain(samples: &mut [f32], volume: f32) {
    if (volume - 1.0).abs() < f32::EPSILON {
        return;
    }
    for sample in samples.iter_mut() {
        *sample = (*sample * volume).clamp(-1.0, 1.0);
    }
}

/// Resamples by `ratio` (output frames per input frame).
///
/// The whole clip is one input chunk. The resampler tail is drained and its
/// leading delay dropped, so the output holds `round(frames * ratio)` frames.
pub fn resample(samples: &[f32], channels: usize, ratio: f64) -> PlaybackResult<Vec<f32>> {
    if (ratio - 1.0).abs() < 1e-9 || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let planar = deinterleave(samples, channels);
    let input_frames = planar[0].len();
    let expected_frames = (input_frames as f64 * ratio).round() as usize;
    let mut resampler = FastFixedIn::<f32>::new(
        ratio,
        1.0,
        PolynomialDegree::Cubic,
        input_frames,
        channels,
    )
    .map_err(|err| PlaybackError::Resample(err.to_string()))?;
    let delay = resampler.output_delay();

    let mut output = resampler
        .process(&planar, None)
        .map_err(|err| PlaybackError::Resample(err.to_string()))?;
    let tail = resampler
        .process_partial::<Vec<f32>>(None, None)
        .map_err(|err| PlaybackError::Resample(err.to_string()))?;

    for (channel, rest) in output.iter_mut().zip(tail) {
        channel.extend(rest);
        channel.drain(..delay.min(channel.len()));
        channel.truncate(expected_frames);
    }
    Ok(interleave(&output))
}

/// Maps `from`-channel frames onto a `to`-channel layout.
///
/// Mono is duplicated to every output channel, downmix to mono averages,
/// extra output channels are silent.
pub fn remap_channels(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 {
        return samples.to_vec();
    }

    let mut output = Vec::with_capacity(samples.len() / from * to);
    for frame in samples.chunks_exact(from) {
        if to == 1 {
            output.push(frame.iter().sum::<f32>() / from as f32);
            continue;
        }
        for ch in 0..to {
            let sample = if from == 1 {
                frame[0]
            } else {
                frame.get(ch).copied().unwrap_or(0.0)
            };
            output.push(sample);
        }
    }
    output
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            planar[ch].push(*sample);
        }
    }
    planar
}

fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = planar.first() else {
        return Vec::new();
    };
    let frames = first.len();
    let mut interleaved = Vec::with_capacity(frames * planar.len());
    for frame in 0..frames {
        for channel in planar {
            interleaved.push(channel[frame]);
        }
    }
    interleaved
}
