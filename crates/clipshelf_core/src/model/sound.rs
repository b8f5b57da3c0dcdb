//! Sound domain model.
//!
//! # Responsibility
//! - Define the canonical record for one archived clip.
//! - Validate clip names and tags before they reach storage.
//!
//! # Invariants
//! - `name` is unique across live records and doubles as the file stem.
//! - `file_path` lives directly inside the archive root.
//! - `tags` is a set; duplicates collapse and order carries no meaning.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const MAX_NAME_BYTES: usize = 255;

static FORBIDDEN_NAME_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[/\\\x00]").expect("valid forbidden name regex"));

/// Canonical record for one archived clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sound {
    /// Unique external identifier and file stem.
    pub name: String,
    /// Absolute path of the backing file inside the archive root.
    pub file_path: PathBuf,
    /// Descriptive labels.
    pub tags: BTreeSet<String>,
}

impl Sound {
    /// Creates an untagged sound record.
    pub fn new(name: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            file_path: file_path.into(),
            tags: BTreeSet::new(),
        }
    }

    /// Returns the backing file extension, if any.
    pub fn extension(&self) -> Option<&str> {
        self.file_path.extension().and_then(|ext| ext.to_str())
    }

    /// Returns whether the backing file is currently present on disk.
    ///
    /// A record for which this returns `false` is an orphan.
    pub fn file_exists(&self) -> bool {
        self.file_path.is_file()
    }
}

impl Display for Sound {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.file_path.display())?;
        if !self.tags.is_empty() {
            let tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
            write!(f, " [{}]", tags.join(", "))?;
        }
        Ok(())
    }
}

/// Validation failures for names and tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundValidationError {
    /// Name is blank after trim.
    BlankName,
    /// Name contains a path separator or NUL.
    NameHasForbiddenChars(String),
    /// Name would produce a hidden file.
    NameStartsWithDot(String),
    /// Name exceeds the filesystem-safe length.
    NameTooLong(String),
    /// Tag is blank after trim.
    BlankTag,
}

impl Display for SoundValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "sound name must not be blank"),
            Self::NameHasForbiddenChars(name) => {
                write!(f, "sound name `{name}` must not contain path separators")
            }
            Self::NameStartsWithDot(name) => {
                write!(f, "sound name `{name}` must not start with `.`")
            }
            Self::NameTooLong(name) => write!(
                f,
                "sound name `{name}` exceeds {MAX_NAME_BYTES} bytes"
            ),
            Self::BlankTag => write!(f, "tag must not be blank"),
        }
    }
}

impl Error for SoundValidationError {}

/// Validates and trims one sound name.
///
/// Names become file stems, so anything that could escape the archive root
/// or produce a hidden file is rejected.
pub fn normalize_name(name: &str) -> Result<String, SoundValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SoundValidationError::BlankName);
    }
    if FORBIDDEN_NAME_CHARS_RE.is_match(trimmed) {
        return Err(SoundValidationError::NameHasForbiddenChars(
            trimmed.to_string(),
        ));
    }
    if trimmed.starts_with('.') {
        return Err(SoundValidationError::NameStartsWithDot(trimmed.to_string()));
    }
    if trimmed.len() > MAX_NAME_BYTES {
        return Err(SoundValidationError::NameTooLong(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Validates and trims one tag. Tags keep their case.
pub fn normalize_tag(tag: &str) -> Result<String, SoundValidationError> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        return Err(SoundValidationError::BlankTag);
    }
    Ok(trimmed.to_string())
}

/// Derives a default sound name from a source file stem.
pub fn name_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}
