//! Archive storage orchestration.
//!
//! # Responsibility
//! - Own the archive root and keep files and metadata records in lockstep.
//! - Expose the typed storage error taxonomy.
//!
//! # Invariants
//! - No other component writes to the archive directory.

mod commander;
mod error;

pub use commander::StorageCommander;
pub use error::{ArchiveError, ArchiveResult};
