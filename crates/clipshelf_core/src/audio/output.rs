//! Audio device output using cpal.
//!
//! Each `play` call opens its own output stream, so overlapping calls from
//! different threads mix in the host audio server.

use super::decode::decode_file;
use super::transform::render_clip;
use crate::playback::{AudioBackend, PlaybackError, PlaybackOptions, PlaybackResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use log::{debug, info, warn};
use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

/// Extra wait on top of the clip duration before giving up on completion.
const COMPLETION_MARGIN: Duration = Duration::from_secs(2);
/// Lets the device flush its last buffer before the stream is dropped.
const DRAIN_DELAY: Duration = Duration::from_millis(100);

/// Plays clips on a cpal output device.
#[derive(Debug, Clone, Default)]
pub struct DeviceBackend {
    device_name: Option<String>,
}

impl DeviceBackend {
    /// Uses the host's default output device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the named output device, falling back to the default one.
    pub fn with_device(device_name: impl Into<String>) -> Self {
        Self {
            device_name: Some(device_name.into()),
        }
    }

    /// Lists output device names on the default host.
    pub fn list_devices() -> PlaybackResult<Vec<String>> {
        let host = cpal::default_host();
        let devices: Vec<String> = host
            .output_devices()
            .map_err(|err| PlaybackError::Output(format!("failed to enumerate devices: {err}")))?
            .filter_map(|device| device.name().ok())
            .collect();
        Ok(devices)
    }

    fn select_device(&self) -> PlaybackResult<Device> {
        let host = cpal::default_host();
        if let Some(name) = self.device_name.as_deref() {
            let found = host
                .output_devices()
                .map_err(|err| {
                    PlaybackError::Output(format!("failed to enumerate devices: {err}"))
                })?
                .find(|device| device.name().ok().as_deref() == Some(name));
            match found {
                Some(device) => return Ok(device),
                None => warn!(
                    "event=audio_device module=audio status=warn requested={} fallback=default",
                    name
                ),
            }
        }
        host.default_output_device()
            .ok_or_else(|| PlaybackError::Output("no default output device found".to_string()))
    }
}

impl AudioBackend for DeviceBackend {
    fn play(&self, path: &Path, options: &PlaybackOptions) -> PlaybackResult<()> {
        let clip = decode_file(path)?;
        let device = self.select_device()?;
        let supported = device
            .default_output_config()
            .map_err(|err| PlaybackError::Output(format!("failed to get device config: {err}")))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.config();
        let device_channels = usize::from(config.channels);
        let device_rate = config.sample_rate.0;

        let samples = render_clip(clip, options, device_rate, device_channels)?;
        if samples.is_empty() {
            return Ok(());
        }
        let frames = samples.len() / device_channels;
        let expected = Duration::from_secs_f64(frames as f64 / f64::from(device_rate));
        debug!(
            "event=clip_play module=audio status=start path={} frames={} device_rate={} format={:?}",
            path.display(),
            frames,
            device_rate,
            sample_format
        );

        let (done_tx, done_rx) = mpsc::channel();
        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, samples, done_tx)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, samples, done_tx)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, samples, done_tx)?,
            other => {
                return Err(PlaybackError::Output(format!(
                    "unsupported sample format: {other:?}"
                )));
            }
        };
        stream
            .play()
            .map_err(|err| PlaybackError::Output(format!("failed to start stream: {err}")))?;

        let outcome = done_rx
            .recv_timeout(expected + COMPLETION_MARGIN)
            .map_err(|_| {
                PlaybackError::Output(format!(
                    "playback of `{}` did not complete in time",
                    path.display()
                ))
            })
            .and_then(|result| result.map_err(PlaybackError::Output));
        thread::sleep(DRAIN_DELAY);
        drop(stream);

        if outcome.is_ok() {
            info!(
                "event=clip_play module=audio status=ok path={} duration_ms={}",
                path.display(),
                expected.as_millis()
            );
        }
        outcome
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    samples: Vec<f32>,
    done: Sender<Result<(), String>>,
) -> PlaybackResult<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let error_tx = done.clone();
    let mut position = 0usize;
    let mut finished = false;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for slot in data.iter_mut() {
                    let sample = samples.get(position).copied().unwrap_or(0.0);
                    *slot = T::from_sample(sample);
                    position = position.saturating_add(1);
                }
                if !finished && position >= samples.len() {
                    finished = true;
                    let _ = done.send(Ok(()));
                }
            },
            move |err| {
                let _ = error_tx.send(Err(err.to_string()));
            },
            None,
        )
        .map_err(|err| PlaybackError::Output(format!("failed to build output stream: {err}")))
}
