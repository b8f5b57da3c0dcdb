//! Clip playback scheduling.
//!
//! # Responsibility
//! - Resolve clip names through the storage commander before any audio.
//! - Drive an `AudioBackend` sequentially or with overlapping clips.
//!
//! # Invariants
//! - Resolution of every requested name completes before the first clip
//!   starts; an unknown name means zero clips played.
//! - Transform options apply uniformly to every clip of one call.

mod options;
mod scheduler;

pub use options::PlaybackOptions;
pub use scheduler::PlaybackScheduler;

use crate::storage::ArchiveError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub type PlaybackResult<T> = Result<T, PlaybackError>;

/// Audio output capability used by the scheduler.
///
/// `play` blocks until the clip has finished. Implementations are shared
/// between playback threads.
pub trait AudioBackend: Send + Sync {
    fn play(&self, path: &Path, options: &PlaybackOptions) -> PlaybackResult<()>;
}

impl<B: AudioBackend + ?Sized> AudioBackend for Box<B> {
    fn play(&self, path: &Path, options: &PlaybackOptions) -> PlaybackResult<()> {
        (**self).play(path, options)
    }
}

/// Errors raised by playback entry points and backends.
#[derive(Debug)]
pub enum PlaybackError {
    /// Requested clip name does not resolve; nothing was played.
    NotFound(String),
    /// Speed/volume outside the accepted range.
    InvalidOptions(String),
    /// Storage failure other than a missing name.
    Storage(ArchiveError),
    /// Clip file cannot be decoded.
    Decode { path: PathBuf, message: String },
    /// Sample-rate conversion failed.
    Resample(String),
    /// Audio device or stream failure.
    Output(String),
}

impl Display for PlaybackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "name not found in archive: {name}"),
            Self::InvalidOptions(message) => write!(f, "invalid playback options: {message}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Decode { path, message } => {
                write!(f, "failed to decode `{}`: {message}", path.display())
            }
            Self::Resample(message) => write!(f, "resampling failed: {message}"),
            Self::Output(message) => write!(f, "audio output failed: {message}"),
        }
    }
}

impl Error for PlaybackError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ArchiveError> for PlaybackError {
    fn from(value: ArchiveError) -> Self {
        match value {
            ArchiveError::NameMissing(name) => Self::NotFound(name),
            other => Self::Storage(other),
        }
    }
}
