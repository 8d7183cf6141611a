//! Diff calculation for grade notifications.
//!
//! Compares the stored snapshot with the freshly fetched one and classifies
//! every course whose grade appeared or changed. Courses that disappeared
//! from the portal are ignored.

use crate::models::{ChangeRecord, ChangeSet, GradeSnapshot};

/// Calculate the changes between previous and current snapshots.
///
/// Records come out ordered by course identifier.
pub fn compute_changes(previous: &GradeSnapshot, current: &GradeSnapshot) -> ChangeSet {
    let records = current
        .iter()
        .filter_map(|(course, value)| match previous.get(course) {
            None => Some(ChangeRecord::new(course, value)),
            Some(old) if old != value => Some(ChangeRecord::changed(course, old, value)),
            Some(_) => None,
        })
        .collect();

    ChangeSet::from_records(records)
}
