// src/models/mod.rs

//! Domain models for the grade watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod change;
mod config;
mod grades;

// Re-export all public types
pub use change::{ChangeKind, ChangeRecord, ChangeSet};
pub use config::{Config, NotifyConfig, PortalConfig, RunConfig, TOPIC_URL_ENV, UserEntry};
pub use grades::{Credentials, GradeRow, GradeSnapshot, UserContext, snapshot_from_rows};
