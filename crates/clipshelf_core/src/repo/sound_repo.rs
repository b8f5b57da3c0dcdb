//! Sound repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and tag-set queries over `sounds`, keyed by unique name.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - `sounds.name` uniqueness is enforced by the schema, not by callers.
//! - `update_identity` changes `name` and `file_path` in one statement.
//! - Multi-row writes (`insert_sound`, `delete_sounds`) run in one transaction.

use crate::db::DbError;
use crate::model::sound::Sound;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, Transaction,
    TransactionBehavior,
};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for sound persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// No live record carries this name.
    NotFound(String),
    /// Another live record already carries this name.
    Conflict(String),
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted or supplied data cannot be mapped to the read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(name) => write!(f, "sound not found: {name}"),
            Self::Conflict(name) => write!(f, "sound name already taken: {name}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "sound repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid sound data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::Conflict(_) => None,
            Self::MissingRequiredTable(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Metadata store capability required by the storage commander.
pub trait SoundRepository {
    /// Inserts one record with its tags. Fails with `Conflict` on a taken name.
    fn insert_sound(&self, sound: &Sound) -> RepoResult<()>;
    /// Loads one record by exact name.
    fn get_sound(&self, name: &str) -> RepoResult<Option<Sound>>;
    /// Loads the record whose backing file is `file_path`, if any.
    fn find_by_path(&self, file_path: &Path) -> RepoResult<Option<Sound>>;
    /// Lists every live record ordered by name.
    fn list_sounds(&self) -> RepoResult<Vec<Sound>>;
    /// Lists records carrying at least one of `tags`, ordered by name.
    fn list_by_tags(&self, tags: &[String]) -> RepoResult<Vec<Sound>>;
    /// Atomically replaces `name` and `file_path` of one record.
    fn update_identity(&self, old_name: &str, new_name: &str, new_path: &Path)
        -> RepoResult<()>;
    /// Deletes one record and its tag links.
    fn delete_sound(&self, name: &str) -> RepoResult<()>;
    /// Deletes all named records in one transaction.
    fn delete_sounds(&self, names: &[String]) -> RepoResult<()>;
    /// Adds one tag; adding a present tag is a no-op.
    fn add_tag(&self, name: &str, tag: &str) -> RepoResult<()>;
    /// Removes one tag; removing an absent tag is a no-op.
    fn remove_tag(&self, name: &str, tag: &str) -> RepoResult<()>;
    /// Lists tags that label at least one record, sorted.
    fn list_tags(&self) -> RepoResult<Vec<String>>;
}

/// SQLite-backed sound repository.
///
/// Owns its connection behind a mutex so the repository can be shared
/// between threads.
pub struct SqliteSoundRepository {
    conn: Mutex<Connection>,
}

impl SqliteSoundRepository {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_sound_connection_ready(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SoundRepository for SqliteSoundRepository {
    fn insert_sound(&self, sound: &Sound) -> RepoResult<()> {
        let file_path = path_to_db(&sound.file_path)?;
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO sounds (name, file_path) VALUES (?1, ?2);",
            params![sound.name.as_str(), file_path],
        )
        .map_err(|err| map_unique_violation(err, &sound.name))?;

        for tag in &sound.tags {
            link_tag_in_tx(&tx, &sound.name, tag)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get_sound(&self, name: &str) -> RepoResult<Option<Sound>> {
        let conn = self.lock();
        query_one(
            &conn,
            "SELECT id, name, file_path FROM sounds WHERE name = ?1;",
            name,
        )
    }

    fn find_by_path(&self, file_path: &Path) -> RepoResult<Option<Sound>> {
        let file_path = path_to_db(file_path)?;
        let conn = self.lock();
        query_one(
            &conn,
            "SELECT id, name, file_path FROM sounds WHERE file_path = ?1;",
            file_path,
        )
    }

    fn list_sounds(&self) -> RepoResult<Vec<Sound>> {
        let conn = self.lock();
        query_sounds(
            &conn,
            "SELECT id, name, file_path FROM sounds ORDER BY name ASC;",
            Vec::new(),
        )
    }

    fn list_by_tags(&self, tags: &[String]) -> RepoResult<Vec<Sound>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; tags.len()].join(", ");
        let sql = format!(
            "SELECT DISTINCT s.id, s.name, s.file_path
             FROM sounds s
             INNER JOIN sound_tags st ON st.sound_id = s.id
             INNER JOIN tags t ON t.id = st.tag_id
             WHERE t.name IN ({placeholders})
             ORDER BY s.name ASC;"
        );
        let bind_values = tags.iter().map(|tag| Value::Text(tag.clone())).collect();

        let conn = self.lock();
        query_sounds(&conn, &sql, bind_values)
    }

    fn update_identity(
        &self,
        old_name: &str,
        new_name: &str,
        new_path: &Path,
    ) -> RepoResult<()> {
        let file_path = path_to_db(new_path)?;
        let conn = self.lock();
        let changed = conn
            .execute(
                "UPDATE sounds
                 SET
                    name = ?1,
                    file_path = ?2,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE name = ?3;",
                params![new_name, file_path, old_name],
            )
            .map_err(|err| map_unique_violation(err, new_name))?;

        if changed == 0 {
            return Err(RepoError::NotFound(old_name.to_string()));
        }

        Ok(())
    }

    fn delete_sound(&self, name: &str) -> RepoResult<()> {
        let conn = self.lock();
        let changed = conn.execute("DELETE FROM sounds WHERE name = ?1;", [name])?;
        if changed == 0 {
            return Err(RepoError::NotFound(name.to_string()));
        }
        Ok(())
    }

    fn delete_sounds(&self, names: &[String]) -> RepoResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for name in names {
            let changed = tx.execute("DELETE FROM sounds WHERE name = ?1;", [name.as_str()])?;
            if changed == 0 {
                return Err(RepoError::NotFound(name.clone()));
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn add_tag(&self, name: &str, tag: &str) -> RepoResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !sound_exists_in_tx(&tx, name)? {
            return Err(RepoError::NotFound(name.to_string()));
        }
        link_tag_in_tx(&tx, name, tag)?;
        tx.commit()?;
        Ok(())
    }

    fn remove_tag(&self, name: &str, tag: &str) -> RepoResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !sound_exists_in_tx(&tx, name)? {
            return Err(RepoError::NotFound(name.to_string()));
        }
        tx.execute(
            "DELETE FROM sound_tags
             WHERE sound_id = (SELECT id FROM sounds WHERE name = ?1)
               AND tag_id = (SELECT id FROM tags WHERE name = ?2);",
            params![name, tag],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn list_tags(&self) -> RepoResult<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT t.name
             FROM tags t
             INNER JOIN sound_tags st ON st.tag_id = t.id
             ORDER BY t.name ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(row.get("name")?);
        }
        Ok(tags)
    }
}

fn query_one(conn: &Connection, sql: &str, key: &str) -> RepoResult<Option<Sound>> {
    let row = conn
        .query_row(sql, [key], |row| {
            Ok((
                row.get::<_, i64>("id")?,
                row.get::<_, String>("name")?,
                row.get::<_, String>("file_path")?,
            ))
        })
        .optional()?;

    match row {
        Some((id, name, file_path)) => Ok(Some(Sound {
            name,
            file_path: PathBuf::from(file_path),
            tags: load_tags_for_sound(conn, id)?,
        })),
        None => Ok(None),
    }
}

fn query_sounds(conn: &Connection, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Sound>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut sounds = Vec::new();
    while let Some(row) = rows.next()? {
        let id: i64 = row.get("id")?;
        let file_path: String = row.get("file_path")?;
        sounds.push(Sound {
            name: row.get("name")?,
            file_path: PathBuf::from(file_path),
            tags: load_tags_for_sound(conn, id)?,
        });
    }
    Ok(sounds)
}

fn load_tags_for_sound(conn: &Connection, sound_id: i64) -> RepoResult<BTreeSet<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name
         FROM sound_tags st
         INNER JOIN tags t ON t.id = st.tag_id
         WHERE st.sound_id = ?1;",
    )?;
    let mut rows = stmt.query([sound_id])?;
    let mut tags = BTreeSet::new();
    while let Some(row) = rows.next()? {
        tags.insert(row.get(0)?);
    }
    Ok(tags)
}

fn link_tag_in_tx(tx: &Transaction<'_>, name: &str, tag: &str) -> RepoResult<()> {
    tx.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1);", [tag])?;
    tx.execute(
        "INSERT OR IGNORE INTO sound_tags (sound_id, tag_id)
         SELECT s.id, t.id
         FROM sounds s, tags t
         WHERE s.name = ?1
           AND t.name = ?2;",
        params![name, tag],
    )?;
    Ok(())
}

fn sound_exists_in_tx(tx: &Transaction<'_>, name: &str) -> RepoResult<bool> {
    let exists: i64 = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM sounds WHERE name = ?1);",
        [name],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn map_unique_violation(err: rusqlite::Error, name: &str) -> RepoError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            RepoError::Conflict(name.to_string())
        }
        _ => err.into(),
    }
}

fn path_to_db(path: &Path) -> RepoResult<&str> {
    path.to_str().ok_or_else(|| {
        RepoError::InvalidData(format!(
            "file path `{}` is not valid UTF-8",
            path.display()
        ))
    })
}

fn ensure_sound_connection_ready(conn: &Connection) -> RepoResult<()> {
    for table in ["sounds", "tags", "sound_tags"] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
