use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use quiz_core::model::Username;
use serde_json::Value;

use crate::repository::{DocumentRepository, StorageError};

/// Keeps one pretty-printed `<username>.json` file per user in a directory.
///
/// Writes go to a hidden temporary sibling first and are renamed over the
/// target, so readers see either the old or the new document in full.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    root: PathBuf,
}

impl JsonFileRepository {
    /// Open (and create if needed) the data directory.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the document for `user`.
    #[must_use]
    pub fn document_path(&self, user: &Username) -> PathBuf {
        self.root.join(format!("{user}.json"))
    }

    fn temp_path(&self, user: &Username) -> PathBuf {
        self.root.join(format!(".{user}.json.tmp"))
    }
}

impl DocumentRepository for JsonFileRepository {
    fn fetch(&self, user: &Username) -> Result<Option<Value>, StorageError> {
        let path = self.document_path(user);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let value = serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::Serialization(format!("{}: {e}", path.display()))
        })?;
        Ok(Some(value))
    }

    fn replace(&self, user: &Username, document: &Value) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let tmp = self.temp_path(user);
        let target = self.document_path(user);

        if let Err(err) = write_then_rename(&tmp, &target, &bytes) {
            tracing::warn!(%user, path = %target.display(), error = %err, "failed to replace progress document");
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(())
    }
}

fn write_then_rename(tmp: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, JsonFileRepository) {
        let dir = TempDir::new().unwrap();
        let repo = JsonFileRepository::open(dir.path().join("user_data")).unwrap();
        (dir, repo)
    }

    #[test]
    fn open_creates_directory() {
        let (_dir, repo) = setup();
        assert!(repo.root().is_dir());
    }

    #[test]
    fn missing_document_is_none() {
        let (_dir, repo) = setup();
        let user = Username::new("nobody").unwrap();
        assert!(repo.fetch(&user).unwrap().is_none());
    }

    #[test]
    fn replace_writes_pretty_utf8_and_leaves_no_temp_file() {
        let (_dir, repo) = setup();
        let user = Username::new("alice").unwrap();
        let doc = json!({"maogai": {"by_unit": {"第一章": {}}}});
        repo.replace(&user, &doc).unwrap();

        let text = fs::read_to_string(repo.document_path(&user)).unwrap();
        assert!(text.contains("第一章"));
        assert!(text.contains('\n'));
        assert!(!repo.temp_path(&user).exists());
        assert_eq!(repo.fetch(&user).unwrap(), Some(doc));
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let (_dir, repo) = setup();
        let user = Username::new("carol").unwrap();
        let target = repo.document_path(&user);
        fs::create_dir(&target).unwrap();
        fs::write(target.join("occupied"), b"x").unwrap();

        let err = repo.replace(&user, &json!({"maogai": {}})).unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(!repo.temp_path(&user).exists());
    }

    #[test]
    fn failed_create_reports_io_error() {
        let (_dir, repo) = setup();
        let user = Username::new("dave").unwrap();
        fs::remove_dir_all(repo.root()).unwrap();

        let err = repo.replace(&user, &json!({"maogai": {}})).unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(!repo.temp_path(&user).exists());
        assert!(!repo.document_path(&user).exists());
    }

    #[test]
    fn corrupt_document_is_a_serialization_error() {
        let (_dir, repo) = setup();
        let user = Username::new("broken").unwrap();
        fs::write(repo.document_path(&user), b"{not json").unwrap();
        assert!(matches!(
            repo.fetch(&user),
            Err(StorageError::Serialization(_))
        ));
    }
}
