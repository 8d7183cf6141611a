//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── grades_{user}.json       # Current snapshot
//! └── grades_{user}.json.tmp   # Only exists while a save is in flight
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::GradeSnapshot;
use crate::storage::{SnapshotStore, StoredSnapshot};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root_dir: PathBuf,
}

impl LocalStore {
    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Path of the snapshot file for a user.
    pub fn path_for(&self, user: &str) -> PathBuf {
        self.root_dir.join(format!("grades_{}.json", file_stem(user)))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    ///
    /// The temp file is removed again when any step fails.
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.ensure_dir(path).await?;

        let tmp = path.with_extension("json.tmp");
        if let Err(e) = replace_file(&tmp, path, bytes).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Cannot remove {}: {}", tmp.display(), cleanup);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(path, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read the full stored document, if any.
    pub async fn read_record(&self, user: &str) -> Result<Option<StoredSnapshot>> {
        let path = self.path_for(user);
        match self.read_bytes(&path).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| AppError::store_corruption(path.display().to_string(), e)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SnapshotStore for LocalStore {
    async fn load(&self, user: &str) -> Result<GradeSnapshot> {
        match self.read_record(user).await? {
            Some(record) => {
                log::info!(
                    "Loaded {} previous grades for '{}' from {}",
                    record.grades.len(),
                    user,
                    self.path_for(user).display()
                );
                Ok(record.grades)
            }
            None => {
                log::info!("No previous grades for '{}', starting empty", user);
                Ok(GradeSnapshot::new())
            }
        }
    }

    async fn save(&self, user: &str, snapshot: &GradeSnapshot) -> Result<()> {
        let path = self.path_for(user);
        let record = StoredSnapshot::new(user, snapshot.clone());
        self.write_json(&path, &record).await?;
        log::info!(
            "Saved {} grades for '{}' to {}",
            record.count,
            user,
            path.display()
        );
        Ok(())
    }
}

async fn replace_file(tmp: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = tokio::fs::File::create(tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(tmp, path).await?;
    Ok(())
}

/// File name stem for a user id.
///
/// `[A-Za-z0-9_-]` is kept as is, every other byte becomes `.xx` (lowercase
/// hex). `.` never passes through unescaped, so distinct ids always get
/// distinct names and no name can climb out of the root directory.
fn file_stem(user: &str) -> String {
    let mut stem = String::with_capacity(user.len());
    for byte in user.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!(".{byte:02x}"));
        }
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> GradeSnapshot {
        GradeSnapshot::from([
            ("Analiza matematica (Y1/S1)".to_string(), "9".to_string()),
            ("Fizica (Y1/S1)".to_string(), "Necules".to_string()),
        ])
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        store.save("STUDENT_A", &sample()).await.unwrap();
        let loaded = store.load("STUDENT_A").await.unwrap();
        assert_eq!(loaded, sample());
    }

    #[tokio::test]
    async fn test_load_missing_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let loaded = store.load("nobody").await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupted_is_error() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        std::fs::write(store.path_for("STUDENT_A"), b"{\"grades\": {").unwrap();

        let err = store.load("STUDENT_A").await.unwrap_err();
        assert!(matches!(err, AppError::StoreCorruption { .. }));
    }

    #[tokio::test]
    async fn test_load_unreadable_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        // A directory where the file should be cannot be read as a file.
        std::fs::create_dir_all(store.path_for("STUDENT_A")).unwrap();

        let err = store.load("STUDENT_A").await.unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }

    #[tokio::test]
    async fn test_save_replaces_and_leaves_no_temp() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path().join("nested"));

        store.save("STUDENT_A", &sample()).await.unwrap();
        let mut updated = sample();
        updated.insert("Chimie (Y1/S2)".into(), "10".into());
        store.save("STUDENT_A", &updated).await.unwrap();

        assert_eq!(store.load("STUDENT_A").await.unwrap(), updated);
        let names: Vec<_> = std::fs::read_dir(store.root_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["grades_STUDENT_A.json".to_string()]);
    }

    #[tokio::test]
    async fn test_users_do_not_share_records() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        store.save("STUDENT_A", &sample()).await.unwrap();
        assert!(store.load("STUDENT_B").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_is_human_readable() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store.save("STUDENT_A", &sample()).await.unwrap();

        let text = std::fs::read_to_string(store.path_for("STUDENT_A")).unwrap();
        assert!(text.contains("\"Fizica (Y1/S1)\": \"Necules\""));

        let record = store.read_record("STUDENT_A").await.unwrap().unwrap();
        assert_eq!(record.user, "STUDENT_A");
        assert_eq!(record.count, 2);
    }

    #[tokio::test]
    async fn test_failed_save_removes_temp() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        // A non-empty directory in place of the record makes the rename fail.
        let target = store.path_for("STUDENT_A");
        std::fs::create_dir_all(target.join("keep")).unwrap();

        assert!(store.save("STUDENT_A", &sample()).await.is_err());
        assert!(!target.with_extension("json.tmp").exists());
        assert!(target.join("keep").is_dir());
    }

    #[tokio::test]
    async fn test_similar_ids_get_separate_records() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        assert_ne!(store.path_for("ana.pop"), store.path_for("ana_pop"));

        let math = GradeSnapshot::from([("MATH".to_string(), "9".to_string())]);
        store.save("ana.pop", &math).await.unwrap();
        assert!(store.load("ana_pop").await.unwrap().is_empty());
        assert_eq!(store.load("ana.pop").await.unwrap(), math);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("STUDENT_A"), "STUDENT_A");
        assert_eq!(file_stem("ana-pop"), "ana-pop");
        assert_eq!(file_stem("ana.pop"), "ana.2epop");
        assert_eq!(file_stem("../x y"), ".2e.2e.2fx.20y");
        assert_eq!(file_stem("ă"), ".c4.83");
    }
}
