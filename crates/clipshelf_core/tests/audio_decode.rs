use clipshelf_core::audio::transform::render_clip;
use clipshelf_core::audio::{decode_file, DecodedClip};
use clipshelf_core::{PlaybackError, PlaybackOptions};
use std::path::Path;
use std::time::Duration;

fn write_stereo_wav(path: &Path, frames: u32, sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..frames {
        writer.write_sample(16_384i16).unwrap();
        writer.write_sample(-16_384i16).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn decodes_pcm_wav_into_interleaved_samples() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coffee.wav");
    write_stereo_wav(&path, 4_410, 44_100);

    let clip = decode_file(&path).unwrap();
    assert_eq!(clip.sample_rate, 44_100);
    assert_eq!(clip.channels, 2);
    assert_eq!(clip.frames(), 4_410);
    assert!((clip.duration().as_secs_f64() - 0.1).abs() < 1e-6);
    assert!((clip.samples[0] - 0.5).abs() < 1e-3);
    assert!((clip.samples[1] + 0.5).abs() < 1e-3);
}

#[test]
fn decoded_clip_renders_to_device_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("toaster.wav");
    write_stereo_wav(&path, 1_000, 48_000);
    let clip = decode_file(&path).unwrap();

    let options = PlaybackOptions::default().with_volume(0.5).with_reverse(true);
    let rendered = render_clip(clip, &options, 48_000, 1).unwrap();
    assert_eq!(rendered.len(), 1_000);
    assert!(rendered.iter().all(|sample| sample.abs() < 1e-3));
}

#[test]
fn garbage_file_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("noise.wav");
    std::fs::write(&path, b"definitely not audio").unwrap();

    let err = decode_file(&path).unwrap_err();
    assert!(matches!(err, PlaybackError::Decode { path: failed, .. } if failed == path));
}

#[test]
fn missing_file_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = decode_file(&dir.path().join("ghost.wav")).unwrap_err();
    assert!(err.to_string().contains("open failed"));
}

#[test]
fn empty_clip_has_zero_duration() {
    let clip = DecodedClip {
        samples: Vec::new(),
        sample_rate: 0,
        channels: 0,
    };
    assert_eq!(clip.frames(), 0);
    assert_eq!(clip.duration(), Duration::ZERO);
}
