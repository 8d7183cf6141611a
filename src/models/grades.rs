//! Grade snapshot and user data structures.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Course identifier → grade value for one user at one point in time.
///
/// Grade values are opaque strings: `"7"` and `"7.0"` are different grades.
pub type GradeSnapshot = BTreeMap<String, String>;

/// Portal login for one user.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A watched user for one run.
#[derive(Debug, Clone)]
pub struct UserContext {
    /// Nickname, also the key of the user's snapshot record
    pub id: String,

    /// `None` when the environment has no credentials for this user
    pub credentials: Option<Credentials>,
}

impl UserContext {
    pub fn new(id: impl Into<String>, credentials: Option<Credentials>) -> Self {
        Self {
            id: id.into(),
            credentials,
        }
    }
}

/// One row of the portal's grade table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GradeRow {
    pub year: String,
    pub semester: String,
    pub subject: String,
    pub kind: String,
    pub date: String,
    pub grade: String,
}

impl GradeRow {
    /// Identifier of the course this row grades.
    ///
    /// A grade is keyed by subject, study year and semester.
    pub fn course_id(&self) -> String {
        let subject = self.subject.split_whitespace().collect::<Vec<_>>().join(" ");
        format!("{} (Y{}/S{})", subject, self.year.trim(), self.semester.trim())
    }
}

/// Collapse portal rows into a snapshot. A repeated course keeps its last row.
pub fn snapshot_from_rows<'a>(rows: impl IntoIterator<Item = &'a GradeRow>) -> GradeSnapshot {
    rows.into_iter()
        .map(|row| (row.course_id(), row.grade.trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(subject: &str, grade: &str) -> GradeRow {
        GradeRow {
            year: "2".into(),
            semester: "1".into(),
            subject: subject.into(),
            kind: "E".into(),
            date: "20.06.2025".into(),
            grade: grade.into(),
        }
    }

    #[test]
    fn test_course_id_normalizes_whitespace() {
        let r = row("Analiza\u{a0}matematica   I", "9");
        assert_eq!(r.course_id(), "Analiza matematica I (Y2/S1)");
    }

    #[test]
    fn test_snapshot_keeps_last_duplicate() {
        let rows = vec![row("Fizica", "4"), row("Fizica", "7")];
        let snapshot = snapshot_from_rows(&rows);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["Fizica (Y2/S1)"], "7");
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("alice", "hunter2");
        let shown = format!("{:?}", creds);
        assert!(shown.contains("alice"));
        assert!(!shown.contains("hunter2"));
    }
}
