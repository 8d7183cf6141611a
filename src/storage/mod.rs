//! Storage abstractions for grade snapshot persistence.
//!
//! Each user owns exactly one snapshot record. Records are never shared
//! between users, so runs for different users cannot interfere.
//!
//! ## Directory Structure
//!
//! ```text
//! state/
//! ├── grades_STUDENT_A.json
//! └── grades_STUDENT_B.json
//! ```

pub mod local;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::GradeSnapshot;

// Re-export for convenience
pub use local::LocalStore;

/// On-disk document for one user's snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSnapshot {
    /// User the grades belong to
    pub user: String,
    /// ISO 8601 timestamp of last update
    pub updated_at: DateTime<Utc>,
    /// Number of graded courses
    pub count: usize,
    /// Course identifier → grade value
    pub grades: BTreeMap<String, String>,
}

impl StoredSnapshot {
    pub fn new(user: &str, grades: GradeSnapshot) -> Self {
        Self {
            user: user.to_string(),
            updated_at: Utc::now(),
            count: grades.len(),
            grades,
        }
    }
}

/// Trait for snapshot storage backends.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the last saved snapshot for a user.
    ///
    /// A user without a record gets an empty snapshot. A record that exists
    /// but cannot be read or decoded is an error, never an empty snapshot.
    async fn load(&self, user: &str) -> Result<GradeSnapshot>;

    /// Replace the user's snapshot. Readers observe the old or the new
    /// snapshot, never a partial write.
    async fn save(&self, user: &str, snapshot: &GradeSnapshot) -> Result<()>;
}
