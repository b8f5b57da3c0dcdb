//! Storage-level error taxonomy.

use crate::db::DbError;
use crate::model::sound::SoundValidationError;
use crate::repo::sound_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors raised by storage commander operations.
#[derive(Debug)]
pub enum ArchiveError {
    /// Add/rename would duplicate a live name.
    NameExists(String),
    /// No live record carries this name.
    NameMissing(String),
    /// Requested name cannot be used as a file stem.
    InvalidName(SoundValidationError),
    /// Requested tag is blank.
    InvalidTag(SoundValidationError),
    /// Source path for an add is not a regular file.
    SourceMissing(PathBuf),
    /// Source file already backs the live record `name`.
    AlreadyTracked { name: String, path: PathBuf },
    /// Target file already exists in the archive but is not tracked.
    PathOccupied(PathBuf),
    /// Filesystem failure; the operation was rolled back.
    Io {
        op: &'static str,
        path: PathBuf,
        source: io::Error,
    },
    /// Metadata store failure.
    Store(RepoError),
    /// Store or archive directory cannot be opened. Fatal at startup.
    StoreUnavailable { path: PathBuf, reason: String },
}

impl ArchiveError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unavailable(path: impl Into<PathBuf>, reason: impl Display) -> Self {
        Self::StoreUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl Display for ArchiveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameExists(name) => write!(f, "a sound named `{name}` already exists"),
            Self::NameMissing(name) => write!(f, "no sound named `{name}`"),
            Self::InvalidName(err) => write!(f, "{err}"),
            Self::InvalidTag(err) => write!(f, "{err}"),
            Self::SourceMissing(path) => {
                write!(f, "source file `{}` does not exist", path.display())
            }
            Self::AlreadyTracked { name, path } => write!(
                f,
                "`{}` is already archived as `{name}`",
                path.display()
            ),
            Self::PathOccupied(path) => write!(
                f,
                "archive file `{}` already exists and is not tracked",
                path.display()
            ),
            Self::Io { op, path, source } => {
                write!(f, "{op} failed for `{}`: {source}", path.display())
            }
            Self::Store(err) => write!(f, "{err}"),
            Self::StoreUnavailable { path, reason } => {
                write!(f, "store unavailable at `{}`: {reason}", path.display())
            }
        }
    }
}

impl Error for ArchiveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidName(err) => Some(err),
            Self::InvalidTag(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ArchiveError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(name) => Self::NameMissing(name),
            RepoError::Conflict(name) => Self::NameExists(name),
            other => Self::Store(other),
        }
    }
}

impl From<DbError> for ArchiveError {
    fn from(value: DbError) -> Self {
        Self::Store(RepoError::Db(value))
    }
}
