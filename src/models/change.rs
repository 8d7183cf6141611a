//! Change records produced by comparing two snapshots.

use serde::{Deserialize, Serialize};

/// How a course's grade differs from the previous snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeKind {
    /// Course absent from the previous snapshot
    New { value: String },
    /// Course present in both with different values
    Changed { old: String, new: String },
}

/// A single detected difference for one course.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeRecord {
    pub course: String,
    #[serde(flatten)]
    pub kind: ChangeKind,
}

impl ChangeRecord {
    pub fn new(course: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            course: course.into(),
            kind: ChangeKind::New {
                value: value.into(),
            },
        }
    }

    pub fn changed(
        course: impl Into<String>,
        old: impl Into<String>,
        new: impl Into<String>,
    ) -> Self {
        Self {
            course: course.into(),
            kind: ChangeKind::Changed {
                old: old.into(),
                new: new.into(),
            },
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self.kind, ChangeKind::New { .. })
    }

    /// Grade value after the change.
    pub fn current_value(&self) -> &str {
        match &self.kind {
            ChangeKind::New { value } => value,
            ChangeKind::Changed { new, .. } => new,
        }
    }

    /// Format the record for display.
    pub fn describe(&self) -> String {
        match &self.kind {
            ChangeKind::New { value } => format!("New grade: {} is {}", self.course, value),
            ChangeKind::Changed { old, new } => {
                format!("Changed: {} from {} to {}", self.course, old, new)
            }
        }
    }
}

/// Ordered change records for one user and one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeSet {
    records: Vec<ChangeRecord>,
}

impl ChangeSet {
    pub fn from_records(records: Vec<ChangeRecord>) -> Self {
        Self { records }
    }

    /// Check if there are any changes.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn new_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_new()).count()
    }

    pub fn changed_count(&self) -> usize {
        self.len() - self.new_count()
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChangeRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a ChangeRecord;
    type IntoIter = std::slice::Iter<'a, ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
