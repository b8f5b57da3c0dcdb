use clipshelf_core::db::open_existing_db;
use clipshelf_core::{
    init_archive, ArchiveConfig, ArchiveError, ImportMode, MemoryCache, NoopCache, RepoError,
    RepoResult, Sound, SoundRepository, SoundValidationError, SqliteSoundRepository,
    StorageCommander,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    config: ArchiveConfig,
    incoming: PathBuf,
}

impl Fixture {
    fn new(import_mode: ImportMode) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ArchiveConfig::new(dir.path().join("sounds"), dir.path().join("audio_archive.db"))
            .with_import_mode(import_mode);
        init_archive(&config).unwrap();
        let incoming = dir.path().join("incoming");
        fs::create_dir_all(&incoming).unwrap();
        Self {
            _dir: dir,
            config,
            incoming,
        }
    }

    fn storage(&self) -> StorageCommander<SqliteSoundRepository> {
        StorageCommander::open(&self.config, NoopCache).unwrap()
    }

    fn incoming_wav(&self, stem: &str) -> PathBuf {
        let path = self.incoming.join(format!("{stem}.wav"));
        write_wav(&path);
        path
    }
}

fn write_wav(path: &Path) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..800 {
        let sample = ((i as f32 * 0.1).sin() * 8_000.0) as i16;
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

fn archive_entries<R: SoundRepository>(storage: &StorageCommander<R>) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(storage.root())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn open_without_init_reports_store_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let config = ArchiveConfig::new(dir.path().join("sounds"), dir.path().join("missing.db"));

    let err = StorageCommander::open(&config, NoopCache).err().unwrap();
    assert!(matches!(err, ArchiveError::StoreUnavailable { .. }));
    assert!(!config.db_path.exists());
}

#[test]
fn added_sound_is_retrievable_and_name_stays_unique() {
    let fixture = Fixture::new(ImportMode::Copy);
    let storage = fixture.storage();
    let source = fixture.incoming_wav("coffee");

    let added = storage.add_sound(&source, None).unwrap();
    assert_eq!(added.name, "coffee");
    assert_eq!(added.file_path, storage.root().join("coffee.wav"));

    let found = storage.get_by_name("coffee").unwrap();
    assert!(found.file_exists());
    assert_eq!(found, added);

    let other = fixture.incoming_wav("other");
    let err = storage.add_sound(&other, Some("coffee")).unwrap_err();
    assert!(matches!(err, ArchiveError::NameExists(name) if name == "coffee"));
    assert_eq!(archive_entries(&storage), vec!["coffee.wav"]);
}

#[test]
fn copy_mode_keeps_the_source_and_move_mode_consumes_it() {
    let copy = Fixture::new(ImportMode::Copy);
    let source = copy.incoming_wav("coffee");
    copy.storage().add_sound(&source, None).unwrap();
    assert!(source.is_file());

    let moved = Fixture::new(ImportMode::Move);
    let source = moved.incoming_wav("coffee");
    let storage = moved.storage();
    assert_eq!(storage.import_mode(), ImportMode::Move);
    storage.add_sound(&source, None).unwrap();
    assert!(!source.exists());
    assert!(storage.root().join("coffee.wav").is_file());
}

#[test]
fn explicit_name_becomes_the_file_stem() {
    let fixture = Fixture::new(ImportMode::Copy);
    let storage = fixture.storage();
    let source = fixture.incoming_wav("recording-0041");

    let added = storage.add_sound(&source, Some("coffee-slurp-2")).unwrap();
    assert_eq!(added.file_path, storage.root().join("coffee-slurp-2.wav"));
    assert_eq!(archive_entries(&storage), vec!["coffee-slurp-2.wav"]);
}

#[test]
fn file_already_in_archive_is_registered_or_renamed_in_place() {
    let fixture = Fixture::new(ImportMode::Copy);
    let storage = fixture.storage();
    write_wav(&storage.root().join("toaster.wav"));
    write_wav(&storage.root().join("take-1.wav"));

    storage
        .add_sound(storage.root().join("toaster.wav"), None)
        .unwrap();
    storage
        .add_sound(storage.root().join("take-1.wav"), Some("coffee"))
        .unwrap();

    assert_eq!(archive_entries(&storage), vec!["coffee.wav", "toaster.wav"]);
    assert!(storage.get_by_name("toaster").unwrap().file_exists());
    assert!(storage.get_by_name("coffee").unwrap().file_exists());
}

#[test]
fn add_rejects_missing_sources_and_unsafe_names() {
    let fixture = Fixture::new(ImportMode::Copy);
    let storage = fixture.storage();

    let missing = fixture.incoming.join("ghost.wav");
    assert!(matches!(
        storage.add_sound(&missing, None),
        Err(ArchiveError::SourceMissing(path)) if path == missing
    ));

    let source = fixture.incoming_wav("coffee");
    assert!(matches!(
        storage.add_sound(&source, Some("../escape")),
        Err(ArchiveError::InvalidName(SoundValidationError::NameHasForbiddenChars(_)))
    ));
    assert!(archive_entries(&storage).is_empty());
    assert!(storage.get_sounds().unwrap().is_empty());
}

#[test]
fn untracked_file_in_archive_is_never_overwritten() {
    let fixture = Fixture::new(ImportMode::Copy);
    let storage = fixture.storage();
    let squatter = storage.root().join("coffee.wav");
    fs::write(&squatter, b"not tracked").unwrap();
    let source = fixture.incoming_wav("coffee");

    let err = storage.add_sound(&source, None).unwrap_err();
    assert!(matches!(err, ArchiveError::PathOccupied(path) if path == squatter));
    assert_eq!(fs::read(&squatter).unwrap(), b"not tracked");
    assert!(matches!(
        storage.get_by_name("coffee"),
        Err(ArchiveError::NameMissing(_))
    ));
}

#[test]
fn remove_deletes_record_and_file() {
    let fixture = Fixture::new(ImportMode::Copy);
    let storage = fixture.storage();
    let added = storage
        .add_sound(fixture.incoming_wav("coffee"), None)
        .unwrap();

    assert!(storage.remove_sound("coffee").unwrap());
    assert!(!added.file_path.exists());
    assert!(archive_entries(&storage).is_empty());
    assert!(matches!(
        storage.get_by_name("coffee"),
        Err(ArchiveError::NameMissing(_))
    ));
    assert!(matches!(
        storage.remove_sound("coffee"),
        Err(ArchiveError::NameMissing(name)) if name == "coffee"
    ));
}

#[test]
fn remove_of_orphan_record_still_succeeds() {
    let fixture = Fixture::new(ImportMode::Copy);
    let storage = fixture.storage();
    let added = storage
        .add_sound(fixture.incoming_wav("coffee"), None)
        .unwrap();
    fs::remove_file(&added.file_path).unwrap();

    assert!(storage.remove_sound("coffee").unwrap());
    assert!(storage.get_sounds().unwrap().is_empty());
}

#[test]
fn rename_moves_file_stem_and_record_together() {
    let fixture = Fixture::new(ImportMode::Copy);
    let storage = fixture.storage();
    storage
        .add_sound(fixture.incoming_wav("coffee"), None)
        .unwrap();
    storage.add_tag("coffee", "kitchen").unwrap();

    assert!(storage.rename("coffee", "espresso").unwrap());

    let renamed = storage.get_by_name("espresso").unwrap();
    assert_eq!(renamed.file_path, storage.root().join("espresso.wav"));
    assert!(renamed.file_exists());
    assert!(renamed.tags.contains("kitchen"));
    assert!(matches!(
        storage.get_by_name("coffee"),
        Err(ArchiveError::NameMissing(_))
    ));
    assert_eq!(archive_entries(&storage), vec!["espresso.wav"]);
}

#[test]
fn rename_rejects_missing_source_and_taken_target() {
    let fixture = Fixture::new(ImportMode::Copy);
    let storage = fixture.storage();
    storage
        .add_sound(fixture.incoming_wav("coffee"), None)
        .unwrap();
    storage
        .add_sound(fixture.incoming_wav("toaster"), None)
        .unwrap();

    assert!(matches!(
        storage.rename("ghost", "spirit"),
        Err(ArchiveError::NameMissing(name)) if name == "ghost"
    ));
    assert!(matches!(
        storage.rename("coffee", "toaster"),
        Err(ArchiveError::NameExists(name)) if name == "toaster"
    ));
    assert_eq!(archive_entries(&storage), vec!["coffee.wav", "toaster.wav"]);
    assert!(storage.get_by_name("coffee").unwrap().file_exists());
}

#[test]
fn rename_to_current_name_is_a_no_op() {
    let fixture = Fixture::new(ImportMode::Copy);
    let storage = fixture.storage();
    let added = storage
        .add_sound(fixture.incoming_wav("coffee"), None)
        .unwrap();

    assert!(storage.rename("coffee", "coffee").unwrap());
    assert_eq!(storage.get_by_name("coffee").unwrap(), added);
}

#[test]
fn tags_are_idempotent_and_match_any() {
    let fixture = Fixture::new(ImportMode::Copy);
    let storage = fixture.storage();
    for stem in ["coffee", "toaster", "rain"] {
        storage.add_sound(fixture.incoming_wav(stem), None).unwrap();
    }

    storage.add_tag("coffee", "kitchen").unwrap();
    storage.add_tag("coffee", "kitchen").unwrap();
    storage.add_tag("toaster", " kitchen ").unwrap();
    storage.add_tag("rain", "outside").unwrap();

    let names: Vec<String> = storage
        .get_by_tags(&["kitchen"])
        .unwrap()
        .into_iter()
        .map(|sound| sound.name)
        .collect();
    assert_eq!(names, vec!["coffee", "toaster"]);
    assert_eq!(storage.get_by_name("coffee").unwrap().tags.len(), 1);
    assert_eq!(storage.list_tags().unwrap(), vec!["kitchen", "outside"]);

    assert!(storage.get_by_tags(&["  "]).unwrap().is_empty());
    assert!(storage.get_by_tags::<&str>(&[]).unwrap().is_empty());
    assert!(matches!(
        storage.add_tag("coffee", " "),
        Err(ArchiveError::InvalidTag(SoundValidationError::BlankTag))
    ));
    assert!(matches!(
        storage.add_tag("ghost", "kitchen"),
        Err(ArchiveError::NameMissing(_))
    ));

    storage.remove_tag("coffee", "kitchen").unwrap();
    storage.remove_tag("coffee", "kitchen").unwrap();
    let names: Vec<String> = storage
        .get_by_tags(&["kitchen"])
        .unwrap()
        .into_iter()
        .map(|sound| sound.name)
        .collect();
    assert_eq!(names, vec!["toaster"]);
}

#[test]
fn clean_removes_exactly_the_orphans() {
    let fixture = Fixture::new(ImportMode::Copy);
    let storage = fixture.storage();
    let coffee = storage
        .add_sound(fixture.incoming_wav("coffee"), None)
        .unwrap();
    storage
        .add_sound(fixture.incoming_wav("toaster"), None)
        .unwrap();
    fs::remove_file(&coffee.file_path).unwrap();

    let removed = storage.clean().unwrap();
    assert_eq!(removed, vec![coffee]);
    assert!(matches!(
        storage.get_by_name("coffee"),
        Err(ArchiveError::NameMissing(_))
    ));
    assert!(storage.get_by_name("toaster").unwrap().file_exists());

    assert!(storage.clean().unwrap().is_empty());
}

#[test]
fn cached_lookups_follow_every_mutation() {
    let fixture = Fixture::new(ImportMode::Copy);
    let cache = Arc::new(MemoryCache::new());
    let storage = StorageCommander::open(&fixture.config, Arc::clone(&cache)).unwrap();
    let coffee = storage
        .add_sound(fixture.incoming_wav("coffee"), None)
        .unwrap();
    storage
        .add_sound(fixture.incoming_wav("toaster"), None)
        .unwrap();

    storage.get_by_name("coffee").unwrap();
    storage.get_by_name("toaster").unwrap();
    assert_eq!(cache.len(), 2);

    storage.add_tag("toaster", "kitchen").unwrap();
    assert!(storage.get_by_name("toaster").unwrap().tags.contains("kitchen"));

    storage.rename("toaster", "grill").unwrap();
    assert!(matches!(
        storage.get_by_name("toaster"),
        Err(ArchiveError::NameMissing(_))
    ));
    assert!(storage.get_by_name("grill").unwrap().file_exists());

    fs::remove_file(&coffee.file_path).unwrap();
    storage.clean().unwrap();
    assert!(matches!(
        storage.get_by_name("coffee"),
        Err(ArchiveError::NameMissing(_))
    ));

    storage.remove_sound("grill").unwrap();
    assert!(matches!(
        storage.get_by_name("grill"),
        Err(ArchiveError::NameMissing(_))
    ));
    assert!(cache.is_empty());
}

#[test]
fn resolve_all_fails_on_first_missing_name() {
    let fixture = Fixture::new(ImportMode::Copy);
    let storage = fixture.storage();
    storage
        .add_sound(fixture.incoming_wav("coffee"), None)
        .unwrap();

    let resolved = storage.resolve_all(&["coffee", "coffee"]).unwrap();
    assert_eq!(resolved.len(), 2);
    assert!(matches!(
        storage.resolve_all(&["coffee", "ghost", "phantom"]),
        Err(ArchiveError::NameMissing(name)) if name == "ghost"
    ));
}

#[test]
fn adding_a_file_that_backs_another_record_is_rejected() {
    let fixture = Fixture::new(ImportMode::Copy);
    let storage = fixture.storage();
    let coffee = storage
        .add_sound(fixture.incoming_wav("coffee"), None)
        .unwrap();

    let err = storage
        .add_sound(&coffee.file_path, Some("espresso"))
        .unwrap_err();
    assert!(matches!(
        err,
        ArchiveError::AlreadyTracked { ref name, ref path }
            if name == "coffee" && path == &coffee.file_path
    ));

    assert!(storage.get_by_name("coffee").unwrap().file_exists());
    assert!(matches!(
        storage.get_by_name("espresso"),
        Err(ArchiveError::NameMissing(_))
    ));
    assert_eq!(archive_entries(&storage), vec!["coffee.wav"]);
}

/// Store wrapper whose next call of one operation fails.
struct FlakyRepository {
    inner: SqliteSoundRepository,
    fail_next: Arc<Mutex<Option<&'static str>>>,
}

impl FlakyRepository {
    fn check(&self, op: &'static str) -> RepoResult<()> {
        let mut fail_next = self.fail_next.lock().unwrap();
        if *fail_next == Some(op) {
            *fail_next = None;
            return Err(RepoError::InvalidData(format!("{op} rejected by store")));
        }
        Ok(())
    }
}

impl SoundRepository for FlakyRepository {
    fn insert_sound(&self, sound: &Sound) -> RepoResult<()> {
        self.check("insert_sound")?;
        self.inner.insert_sound(sound)
    }

    fn get_sound(&self, name: &str) -> RepoResult<Option<Sound>> {
        self.inner.get_sound(name)
    }

    fn find_by_path(&self, file_path: &Path) -> RepoResult<Option<Sound>> {
        self.inner.find_by_path(file_path)
    }

    fn list_sounds(&self) -> RepoResult<Vec<Sound>> {
        self.inner.list_sounds()
    }

    fn list_by_tags(&self, tags: &[String]) -> RepoResult<Vec<Sound>> {
        self.inner.list_by_tags(tags)
    }

    fn update_identity(&self, old_name: &str, new_name: &str, new_path: &Path) -> RepoResult<()> {
        self.check("update_identity")?;
        self.inner.update_identity(old_name, new_name, new_path)
    }

    fn delete_sound(&self, name: &str) -> RepoResult<()> {
        self.check("delete_sound")?;
        self.inner.delete_sound(name)
    }

    fn delete_sounds(&self, names: &[String]) -> RepoResult<()> {
        self.check("delete_sounds")?;
        self.inner.delete_sounds(names)
    }

    fn add_tag(&self, name: &str, tag: &str) -> RepoResult<()> {
        self.inner.add_tag(name, tag)
    }

    fn remove_tag(&self, name: &str, tag: &str) -> RepoResult<()> {
        self.inner.remove_tag(name, tag)
    }

    fn list_tags(&self) -> RepoResult<Vec<String>> {
        self.inner.list_tags()
    }
}

fn flaky_storage(
    fixture: &Fixture,
) -> (
    StorageCommander<FlakyRepository>,
    Arc<Mutex<Option<&'static str>>>,
) {
    let fail_next = Arc::new(Mutex::new(None));
    let repo = FlakyRepository {
        inner: SqliteSoundRepository::try_new(open_existing_db(&fixture.config.db_path).unwrap())
            .unwrap(),
        fail_next: Arc::clone(&fail_next),
    };
    let storage = StorageCommander::try_new(&fixture.config.archive_dir, repo, NoopCache)
        .unwrap()
        .with_import_mode(fixture.config.import_mode);
    (storage, fail_next)
}

fn record_names<R: SoundRepository>(storage: &StorageCommander<R>) -> Vec<String> {
    storage
        .get_sounds()
        .unwrap()
        .into_iter()
        .map(|sound| sound.name)
        .collect()
}

#[test]
fn failed_insert_after_copy_removes_the_copy() {
    let fixture = Fixture::new(ImportMode::Copy);
    let (storage, fail_next) = flaky_storage(&fixture);
    let source = fixture.incoming_wav("coffee");

    *fail_next.lock().unwrap() = Some("insert_sound");
    let err = storage.add_sound(&source, None).unwrap_err();

    assert!(matches!(err, ArchiveError::Store(RepoError::InvalidData(_))));
    assert!(source.is_file());
    assert!(archive_entries(&storage).is_empty());
    assert!(record_names(&storage).is_empty());

    storage.add_sound(&source, None).unwrap();
    assert_eq!(archive_entries(&storage), vec!["coffee.wav"]);
}

#[test]
fn failed_insert_after_move_restores_the_source() {
    let fixture = Fixture::new(ImportMode::Move);
    let (storage, fail_next) = flaky_storage(&fixture);
    let source = fixture.incoming_wav("coffee");
    let original = fs::read(&source).unwrap();

    *fail_next.lock().unwrap() = Some("insert_sound");
    assert!(storage.add_sound(&source, None).is_err());

    assert_eq!(fs::read(&source).unwrap(), original);
    assert!(archive_entries(&storage).is_empty());
    assert!(record_names(&storage).is_empty());
}

#[test]
fn failed_insert_after_in_archive_rename_restores_the_old_name() {
    let fixture = Fixture::new(ImportMode::Copy);
    let (storage, fail_next) = flaky_storage(&fixture);
    let take = storage.root().join("take-1.wav");
    write_wav(&take);

    *fail_next.lock().unwrap() = Some("insert_sound");
    assert!(storage.add_sound(&take, Some("coffee")).is_err());

    assert_eq!(archive_entries(&storage), vec!["take-1.wav"]);
    assert!(record_names(&storage).is_empty());
}

#[test]
fn failed_record_update_undoes_the_file_rename() {
    let fixture = Fixture::new(ImportMode::Copy);
    let (storage, fail_next) = flaky_storage(&fixture);
    let coffee = storage
        .add_sound(fixture.incoming_wav("coffee"), None)
        .unwrap();

    *fail_next.lock().unwrap() = Some("update_identity");
    let err = storage.rename("coffee", "espresso").unwrap_err();

    assert!(matches!(err, ArchiveError::Store(_)));
    assert_eq!(archive_entries(&storage), vec!["coffee.wav"]);
    assert_eq!(record_names(&storage), vec!["coffee"]);
    assert_eq!(storage.get_by_name("coffee").unwrap(), coffee);
    assert!(coffee.file_exists());
}

#[test]
fn failed_record_delete_restores_the_staged_file() {
    let fixture = Fixture::new(ImportMode::Copy);
    let (storage, fail_next) = flaky_storage(&fixture);
    let coffee = storage
        .add_sound(fixture.incoming_wav("coffee"), None)
        .unwrap();
    let bytes = fs::read(&coffee.file_path).unwrap();

    *fail_next.lock().unwrap() = Some("delete_sound");
    assert!(storage.remove_sound("coffee").is_err());

    assert_eq!(archive_entries(&storage), vec!["coffee.wav"]);
    assert_eq!(fs::read(&coffee.file_path).unwrap(), bytes);
    assert_eq!(record_names(&storage), vec!["coffee"]);

    assert!(storage.remove_sound("coffee").unwrap());
    assert!(archive_entries(&storage).is_empty());
}

#[test]
fn failed_clean_keeps_every_record() {
    let fixture = Fixture::new(ImportMode::Copy);
    let (storage, fail_next) = flaky_storage(&fixture);
    let coffee = storage
        .add_sound(fixture.incoming_wav("coffee"), None)
        .unwrap();
    fs::remove_file(&coffee.file_path).unwrap();

    *fail_next.lock().unwrap() = Some("delete_sounds");
    assert!(storage.clean().is_err());
    assert_eq!(record_names(&storage), vec!["coffee"]);

    assert_eq!(storage.clean().unwrap(), vec![coffee]);
}
