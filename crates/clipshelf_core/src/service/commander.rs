//! Archive use-case facade.
//!
//! # Responsibility
//! - Forward named archive operations to the storage commander.
//! - Own the sequential and parallel playback entry points.
//!
//! # Invariants
//! - Storage errors propagate unchanged; presentation belongs to callers.
//! - The facade never touches the archive directory directly.

use crate::cache::SoundCache;
use crate::config::ArchiveConfig;
use crate::db::open_db;
use crate::model::sound::Sound;
use crate::playback::{AudioBackend, PlaybackOptions, PlaybackResult, PlaybackScheduler};
use crate::repo::sound_repo::{SoundRepository, SqliteSoundRepository};
use crate::storage::{ArchiveError, ArchiveResult, StorageCommander};
use log::info;
use std::fs;
use std::path::Path;

/// Creates the archive directory and an empty, migrated metadata store.
///
/// Safe to call on an already initialized archive.
pub fn init_archive(config: &ArchiveConfig) -> ArchiveResult<()> {
    fs::create_dir_all(&config.archive_dir)
        .map_err(|err| ArchiveError::io("create archive dir", &config.archive_dir, err))?;
    if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|err| ArchiveError::io("create database dir", parent, err))?;
    }
    open_db(&config.db_path)?;

    info!(
        "event=archive_init module=service status=ok archive_dir={} db_path={}",
        config.archive_dir.display(),
        config.db_path.display()
    );
    Ok(())
}

/// Use-case facade over storage and playback.
pub struct Commander<R: SoundRepository, C: SoundCache, B: AudioBackend> {
    storage: StorageCommander<R, C>,
    player: PlaybackScheduler<B>,
}

impl<C: SoundCache, B: AudioBackend> Commander<SqliteSoundRepository, C, B> {
    /// Opens an initialized archive.
    ///
    /// # Errors
    /// - `StoreUnavailable` when `init_archive` has not been run for `config`.
    pub fn open(config: &ArchiveConfig, cache: C, backend: B) -> ArchiveResult<Self> {
        let storage = StorageCommander::open(config, cache)?;
        Ok(Self::new(storage, backend))
    }
}

impl<R: SoundRepository, C: SoundCache, B: AudioBackend> Commander<R, C, B> {
    pub fn new(storage: StorageCommander<R, C>, backend: B) -> Self {
        Self {
            storage,
            player: PlaybackScheduler::new(backend),
        }
    }

    /// Direct access to storage reads such as `get_by_name`.
    pub fn storage(&self) -> &StorageCommander<R, C> {
        &self.storage
    }

    pub fn player(&self) -> &PlaybackScheduler<B> {
        &self.player
    }

    pub fn add_sound(&self, source: impl AsRef<Path>, name: Option<&str>) -> ArchiveResult<Sound> {
        self.storage.add_sound(source, name)
    }

    pub fn remove_sound(&self, name: &str) -> ArchiveResult<bool> {
        self.storage.remove_sound(name)
    }

    pub fn rename(&self, old_name: &str, new_name: &str) -> ArchiveResult<bool> {
        self.storage.rename(old_name, new_name)
    }

    pub fn add_tag(&self, name: &str, tag: &str) -> ArchiveResult<()> {
        self.storage.add_tag(name, tag)
    }

    pub fn remove_tag(&self, name: &str, tag: &str) -> ArchiveResult<()> {
        self.storage.remove_tag(name, tag)
    }

    pub fn get_sounds(&self) -> ArchiveResult<Vec<Sound>> {
        self.storage.get_sounds()
    }

    pub fn get_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> ArchiveResult<Vec<Sound>> {
        self.storage.get_by_tags(tags)
    }

    pub fn list_tags(&self) -> ArchiveResult<Vec<String>> {
        self.storage.list_tags()
    }

    pub fn clean(&self) -> ArchiveResult<Vec<Sound>> {
        self.storage.clean()
    }

    /// Plays the named clips one after another.
    pub fn play_sequence<S: AsRef<str>>(
        &self,
        names: &[S],
        options: PlaybackOptions,
    ) -> PlaybackResult<()> {
        self.player.play_sequence(&self.storage, names, options)
    }

    /// Plays the named clips overlapping and waits for all of them.
    pub fn play_parallel<S: AsRef<str>>(
        &self,
        names: &[S],
        options: PlaybackOptions,
    ) -> PlaybackResult<()> {
        self.player.play_parallel(&self.storage, names, options)
    }
}
