//! Storage commander: the only writer of the archive directory.
//!
//! # Responsibility
//! - Compose metadata store, lookup cache and filesystem into
//!   consistency-checked add/rename/remove/clean operations.
//! - Serve snapshot-consistent reads by name, by tags and in bulk.
//!
//! # Invariants
//! - Uniqueness/existence checks happen before any filesystem mutation.
//! - A failed mutation leaves the touched sound fully unapplied: file
//!   placement, rename and removal are rolled back when the store write fails.
//! - Mutations hold the archive write guard for their whole check-then-act
//!   span; reads hold the read guard.
//! - Every mutated name is invalidated in the cache inside the same guard.

use super::error::{ArchiveError, ArchiveResult};
use crate::cache::{NoopCache, SoundCache};
use crate::config::{ArchiveConfig, ImportMode};
use crate::db::{open_existing_db, DbError};
use crate::model::sound::{name_from_path, normalize_name, normalize_tag, Sound};
use crate::repo::sound_repo::{SoundRepository, SqliteSoundRepository};
use log::{error, info, warn};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

const STAGED_REMOVAL_SUFFIX: &str = "removing";

/// How an added file reached its archive location.
#[derive(Debug)]
enum Placement {
    /// Source already had the target path.
    InPlace,
    /// Source inside the archive was renamed.
    Renamed { from: PathBuf },
    /// Source outside the archive was copied.
    Copied,
    /// Source outside the archive was moved.
    Moved { from: PathBuf },
}

/// Mediates every mutation between metadata store, cache and archive files.
pub struct StorageCommander<R: SoundRepository, C: SoundCache = NoopCache> {
    root: PathBuf,
    repo: R,
    cache: C,
    import_mode: ImportMode,
    archive_lock: RwLock<()>,
}

impl<C: SoundCache> StorageCommander<SqliteSoundRepository, C> {
    /// Opens an initialized SQLite store and archive directory.
    ///
    /// # Errors
    /// - `StoreUnavailable` when the database file or archive directory is
    ///   missing, or the schema cannot be used.
    pub fn open(config: &ArchiveConfig, cache: C) -> ArchiveResult<Self> {
        let conn = open_existing_db(&config.db_path).map_err(|err| match err {
            DbError::MissingDatabase(path) => {
                ArchiveError::unavailable(path, "database not initialized")
            }
            other => ArchiveError::unavailable(&config.db_path, other),
        })?;
        let repo = SqliteSoundRepository::try_new(conn)
            .map_err(|err| ArchiveError::unavailable(&config.db_path, err))?;
        Ok(Self::try_new(&config.archive_dir, repo, cache)?.with_import_mode(config.import_mode))
    }
}

impl<R: SoundRepository, C: SoundCache> StorageCommander<R, C> {
    /// Creates a commander over an existing archive directory.
    ///
    /// The root is canonicalized so stored file paths are absolute.
    pub fn try_new(root: impl AsRef<Path>, repo: R, cache: C) -> ArchiveResult<Self> {
        let root = root.as_ref();
        let root = fs::canonicalize(root)
            .map_err(|err| ArchiveError::unavailable(root, format!("archive directory: {err}")))?;
        if !root.is_dir() {
            return Err(ArchiveError::unavailable(
                root,
                "archive path is not a directory",
            ));
        }

        Ok(Self {
            root,
            repo,
            cache,
            import_mode: ImportMode::default(),
            archive_lock: RwLock::new(()),
        })
    }

    /// Sets the policy for sources outside the archive directory.
    pub fn with_import_mode(mut self, import_mode: ImportMode) -> Self {
        self.import_mode = import_mode;
        self
    }

    /// Returns the canonical archive root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn import_mode(&self) -> ImportMode {
        self.import_mode
    }

    /// Adds `source` to the archive under `name` (or its file stem).
    ///
    /// # Errors
    /// - `SourceMissing` when `source` is not a regular file.
    /// - `InvalidName` when the name cannot be used as a file stem.
    /// - `NameExists` when a live record already carries the name.
    /// - `AlreadyTracked` when `source` already backs another live record.
    /// - `PathOccupied` when an untracked file blocks the target path.
    /// - `Io`/`Store` after the placement has been rolled back.
    pub fn add_sound(&self, source: impl AsRef<Path>, name: Option<&str>) -> ArchiveResult<Sound> {
        let source = source.as_ref();
        let started_at = Instant::now();
        if !source.is_file() {
            return Err(ArchiveError::SourceMissing(source.to_path_buf()));
        }

        let raw_name = match name {
            Some(name) => name.to_string(),
            None => name_from_path(source).unwrap_or_default(),
        };
        let name = normalize_name(&raw_name).map_err(ArchiveError::InvalidName)?;

        let _guard = self.write_guard();
        if self.repo.get_sound(&name)?.is_some() {
            return Err(ArchiveError::NameExists(name));
        }

        let source = fs::canonicalize(source)
            .map_err(|err| ArchiveError::io("canonicalize", source, err))?;
        if let Some(owner) = self.repo.find_by_path(&source)? {
            return Err(ArchiveError::AlreadyTracked {
                name: owner.name,
                path: source,
            });
        }
        let target = self.target_path(&name, source.extension());
        let placement = self.place_file(&source, &target)?;

        let sound = Sound::new(name, target);
        if let Err(err) = self.repo.insert_sound(&sound) {
            self.rollback_placement(&placement, &sound.file_path);
            error!(
                "event=sound_add module=storage status=error name={} error={}",
                sound.name, err
            );
            return Err(err.into());
        }
        self.cache.invalidate(&sound.name);

        info!(
            "event=sound_add module=storage status=ok name={} placement={:?} duration_ms={}",
            sound.name,
            placement,
            started_at.elapsed().as_millis()
        );
        Ok(sound)
    }

    /// Removes the named sound's file and record as one unit.
    ///
    /// The file is first staged under a hidden name so it can be restored if
    /// the record delete fails.
    pub fn remove_sound(&self, name: &str) -> ArchiveResult<bool> {
        let _guard = self.write_guard();
        let sound = self
            .repo
            .get_sound(name)?
            .ok_or_else(|| ArchiveError::NameMissing(name.to_string()))?;

        let staged = self.staged_removal_path(&sound.file_path);
        let file_present = sound.file_exists();
        if file_present {
            fs::rename(&sound.file_path, &staged)
                .map_err(|err| ArchiveError::io("remove", &sound.file_path, err))?;
        }

        if let Err(err) = self.repo.delete_sound(name) {
            if file_present {
                self.restore_file(&staged, &sound.file_path);
            }
            return Err(err.into());
        }
        self.cache.invalidate(name);

        if file_present {
            if let Err(err) = fs::remove_file(&staged) {
                warn!(
                    "event=sound_remove module=storage status=warn name={} staged={} error={}",
                    name,
                    staged.display(),
                    err
                );
            }
        }

        info!(
            "event=sound_remove module=storage status=ok name={} file_present={}",
            name, file_present
        );
        Ok(true)
    }

    /// Renames a sound: file stem and record change together or not at all.
    ///
    /// Renaming a sound to its current name is a no-op.
    pub fn rename(&self, old_name: &str, new_name: &str) -> ArchiveResult<bool> {
        let new_name = normalize_name(new_name).map_err(ArchiveError::InvalidName)?;

        let _guard = self.write_guard();
        let sound = self
            .repo
            .get_sound(old_name)?
            .ok_or_else(|| ArchiveError::NameMissing(old_name.to_string()))?;
        if sound.name == new_name {
            return Ok(true);
        }
        if self.repo.get_sound(&new_name)?.is_some() {
            return Err(ArchiveError::NameExists(new_name));
        }

        let target = self.target_path(&new_name, sound.file_path.extension());
        ensure_vacant(&target)?;
        fs::rename(&sound.file_path, &target)
            .map_err(|err| ArchiveError::io("rename", &sound.file_path, err))?;

        if let Err(err) = self.repo.update_identity(&sound.name, &new_name, &target) {
            self.restore_file(&target, &sound.file_path);
            error!(
                "event=sound_rename module=storage status=error name={} new_name={} error={}",
                sound.name, new_name, err
            );
            return Err(err.into());
        }
        self.cache.invalidate(&sound.name);
        self.cache.invalidate(&new_name);

        info!(
            "event=sound_rename module=storage status=ok name={} new_name={}",
            sound.name, new_name
        );
        Ok(true)
    }

    /// Adds `tag` to the named sound. Idempotent.
    pub fn add_tag(&self, name: &str, tag: &str) -> ArchiveResult<()> {
        let tag = normalize_tag(tag).map_err(ArchiveError::InvalidTag)?;
        let _guard = self.write_guard();
        self.repo.add_tag(name, &tag)?;
        self.cache.invalidate(name);
        Ok(())
    }

    /// Removes `tag` from the named sound. Idempotent.
    pub fn remove_tag(&self, name: &str, tag: &str) -> ArchiveResult<()> {
        let tag = normalize_tag(tag).map_err(ArchiveError::InvalidTag)?;
        let _guard = self.write_guard();
        self.repo.remove_tag(name, &tag)?;
        self.cache.invalidate(name);
        Ok(())
    }

    /// Exact-match lookup through the cache.
    pub fn get_by_name(&self, name: &str) -> ArchiveResult<Sound> {
        let _guard = self.read_guard();
        self.lookup(name)
    }

    /// Resolves every name under one read guard, failing on the first miss.
    pub fn resolve_all<S: AsRef<str>>(&self, names: &[S]) -> ArchiveResult<Vec<Sound>> {
        let _guard = self.read_guard();
        names.iter().map(|name| self.lookup(name.as_ref())).collect()
    }

    /// Returns every sound carrying at least one of `tags`.
    ///
    /// Blank tags are ignored; no usable tag yields an empty list.
    pub fn get_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> ArchiveResult<Vec<Sound>> {
        let tags: Vec<String> = tags
            .iter()
            .filter_map(|tag| normalize_tag(tag.as_ref()).ok())
            .collect();
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let _guard = self.read_guard();
        Ok(self.repo.list_by_tags(&tags)?)
    }

    /// Returns all live sounds ordered by name.
    pub fn get_sounds(&self) -> ArchiveResult<Vec<Sound>> {
        let _guard = self.read_guard();
        Ok(self.repo.list_sounds()?)
    }

    /// Returns every tag in use, sorted.
    pub fn list_tags(&self) -> ArchiveResult<Vec<String>> {
        let _guard = self.read_guard();
        Ok(self.repo.list_tags()?)
    }

    /// Deletes every record whose backing file is gone and returns them.
    pub fn clean(&self) -> ArchiveResult<Vec<Sound>> {
        let _guard = self.write_guard();
        let orphans: Vec<Sound> = self
            .repo
            .list_sounds()?
            .into_iter()
            .filter(|sound| !sound.file_exists())
            .collect();
        if orphans.is_empty() {
            info!("event=sound_clean module=storage status=ok removed=0");
            return Ok(orphans);
        }

        let names: Vec<String> = orphans.iter().map(|sound| sound.name.clone()).collect();
        self.repo.delete_sounds(&names)?;
        for name in &names {
            self.cache.invalidate(name);
        }

        info!(
            "event=sound_clean module=storage status=ok removed={}",
            orphans.len()
        );
        Ok(orphans)
    }

    fn lookup(&self, name: &str) -> ArchiveResult<Sound> {
        if let Some(sound) = self.cache.get(name) {
            return Ok(sound);
        }
        let sound = self
            .repo
            .get_sound(name)?
            .ok_or_else(|| ArchiveError::NameMissing(name.to_string()))?;
        self.cache.put(name, sound.clone());
        Ok(sound)
    }

    fn place_file(&self, source: &Path, target: &Path) -> ArchiveResult<Placement> {
        if source == target {
            return Ok(Placement::InPlace);
        }
        ensure_vacant(target)?;

        if source.parent() == Some(self.root.as_path()) {
            fs::rename(source, target).map_err(|err| ArchiveError::io("rename", source, err))?;
            return Ok(Placement::Renamed {
                from: source.to_path_buf(),
            });
        }

        match self.import_mode {
            ImportMode::Copy => {
                copy_file(source, target).map_err(|err| ArchiveError::io("copy", source, err))?;
                Ok(Placement::Copied)
            }
            ImportMode::Move => {
                move_file(source, target).map_err(|err| ArchiveError::io("move", source, err))?;
                Ok(Placement::Moved {
                    from: source.to_path_buf(),
                })
            }
        }
    }

    fn rollback_placement(&self, placement: &Placement, target: &Path) {
        let result = match placement {
            Placement::InPlace => Ok(()),
            Placement::Renamed { from } => fs::rename(target, from),
            Placement::Copied => fs::remove_file(target),
            Placement::Moved { from } => move_file(target, from),
        };
        if let Err(err) = result {
            error!(
                "event=rollback module=storage status=error op=place target={} error={}",
                target.display(),
                err
            );
        }
    }

    fn restore_file(&self, current: &Path, original: &Path) {
        if let Err(err) = fs::rename(current, original) {
            error!(
                "event=rollback module=storage status=error op=restore from={} to={} error={}",
                current.display(),
                original.display(),
                err
            );
        }
    }

    fn target_path(&self, name: &str, extension: Option<&OsStr>) -> PathBuf {
        let mut file_name = name.to_string();
        if let Some(ext) = extension.and_then(OsStr::to_str) {
            file_name.push('.');
            file_name.push_str(ext);
        }
        self.root.join(file_name)
    }

    fn staged_removal_path(&self, file_path: &Path) -> PathBuf {
        let file_name = file_path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or("sound");
        self.root
            .join(format!(".{file_name}.{STAGED_REMOVAL_SUFFIX}"))
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.archive_lock
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, ()> {
        self.archive_lock
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn ensure_vacant(target: &Path) -> ArchiveResult<()> {
    if fs::symlink_metadata(target).is_ok() {
        return Err(ArchiveError::PathOccupied(target.to_path_buf()));
    }
    Ok(())
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // Cross-device moves fall back to copy + delete.
    copy_file(from, to)?;
    if let Err(err) = fs::remove_file(from) {
        let _ = fs::remove_file(to);
        return Err(err);
    }
    Ok(())
}

fn copy_file(from: &Path, to: &Path) -> io::Result<()> {
    copy_or_discard(from, to, |from, to| fs::copy(from, to))
}

/// Runs `copy` and removes whatever it left at `to` when it fails.
///
/// Callers guarantee `to` was vacant, so anything there is a partial copy.
fn copy_or_discard(
    from: &Path,
    to: &Path,
    copy: impl FnOnce(&Path, &Path) -> io::Result<u64>,
) -> io::Result<()> {
    if let Err(err) = copy(from, to) {
        if let Err(cleanup) = fs::remove_file(to) {
            if cleanup.kind() != io::ErrorKind::NotFound {
                error!(
                    "event=rollback module=storage status=error op=copy target={} error={}",
                    to.display(),
                    cleanup
                );
            }
        }
        return Err(err);
    }
    Ok(())
}
