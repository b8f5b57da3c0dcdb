//! Archive configuration.
//!
//! # Responsibility
//! - Describe where the archive directory and metadata database live.
//! - Make the copy-versus-move import policy an explicit choice.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_ARCHIVE_DIR: &str = "sounds";
pub const DEFAULT_DB_FILE: &str = "audio_archive.db";

/// What happens to a source file that lives outside the archive directory.
///
/// Sources already inside the archive are always renamed in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImportMode {
    /// Leave the original where it is and place a copy in the archive.
    #[default]
    Copy,
    /// Move the original into the archive.
    Move,
}

impl ImportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Move => "move",
        }
    }
}

impl Display for ImportMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseImportModeError(String);

impl Display for ParseImportModeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unsupported import mode `{}`; expected copy|move", self.0)
    }
}

impl Error for ParseImportModeError {}

impl FromStr for ImportMode {
    type Err = ParseImportModeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "copy" => Ok(Self::Copy),
            "move" => Ok(Self::Move),
            other => Err(ParseImportModeError(other.to_string())),
        }
    }
}

/// Locations and policies for one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
    /// Directory that exclusively holds clip files.
    pub archive_dir: PathBuf,
    /// SQLite metadata database file.
    pub db_path: PathBuf,
    /// Import policy for sources outside `archive_dir`.
    pub import_mode: ImportMode,
}

impl ArchiveConfig {
    pub fn new(archive_dir: impl Into<PathBuf>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
            db_path: db_path.into(),
            import_mode: ImportMode::default(),
        }
    }

    pub fn with_import_mode(mut self, import_mode: ImportMode) -> Self {
        self.import_mode = import_mode;
        self
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ARCHIVE_DIR, DEFAULT_DB_FILE)
    }
}
