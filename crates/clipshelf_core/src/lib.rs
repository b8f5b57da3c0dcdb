//! Core domain logic for clipshelf, a personal archive of named audio clips.
//! This crate is the single source of truth for archive invariants.

pub mod audio;
pub mod cache;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod playback;
pub mod repo;
pub mod service;
pub mod storage;

#[cfg(feature = "device-output")]
pub use audio::DeviceBackend;
pub use cache::{MemoryCache, NoopCache, SoundCache};
pub use config::{ArchiveConfig, ImportMode};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::sound::{Sound, SoundValidationError};
pub use playback::{AudioBackend, PlaybackError, PlaybackOptions, PlaybackResult, PlaybackScheduler};
pub use repo::sound_repo::{RepoError, RepoResult, SoundRepository, SqliteSoundRepository};
pub use service::commander::{init_archive, Commander};
pub use storage::{ArchiveError, ArchiveResult, StorageCommander};
