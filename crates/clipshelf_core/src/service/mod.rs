//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate storage and playback calls into use-case level APIs.
//! - Keep CLI layers decoupled from storage details.

pub mod commander;
