//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the metadata store contract consumed by the storage commander.
//! - Isolate SQLite query details from filesystem/business orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.
//! - Repositories never touch the archive directory.

pub mod sound_repo;
