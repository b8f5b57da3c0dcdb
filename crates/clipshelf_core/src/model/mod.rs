//! Domain model for archived audio clips.
//!
//! # Responsibility
//! - Define the `Sound` record shared by storage, cache and playback layers.
//! - Own name/tag validation rules used before any mutation.
//!
//! # Invariants
//! - Every sound is identified by a unique, filesystem-safe `name`.
//! - Deletion is a hard delete; there is no tombstone state.

pub mod sound;
