//! File-backed credential storage.
//!
//! The signed-in identity is kept as JSON in `{data_dir}/session.json`,
//! readable only by the owner on Unix.

use std::path::{Path, PathBuf};

use parley_core::identity::CredentialStore;
use parley_types::error::ChatError;
use parley_types::identity::StoredCredentials;
use tracing::debug;

use crate::filesystem::credentials_path;

pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the default location inside `data_dir`.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(credentials_path(data_dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn storage_error(action: &str, path: &Path, err: impl std::fmt::Display) -> ChatError {
    ChatError::Storage(format!("failed to {action} {}: {err}", path.display()))
}

impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<StoredCredentials>, ChatError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(storage_error("read", &self.path, err)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| storage_error("parse", &self.path, e))
    }

    async fn save(&self, credentials: &StoredCredentials) -> Result<(), ChatError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error("create", parent, e))?;
        }
        let json = serde_json::to_string_pretty(credentials)
            .map_err(|e| storage_error("encode", &self.path, e))?;

        // Replaced atomically: write a sibling file, then rename over.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| storage_error("write", &tmp, e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| storage_error("protect", &tmp, e))?;
        }
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| storage_error("replace", &self.path, e))?;
        debug!(path = %self.path.display(), "Credentials saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), ChatError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Credentials cleared");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_error("remove", &self.path, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::identity::User;
    use tempfile::tempdir;

    fn stored() -> StoredCredentials {
        StoredCredentials {
            token: "jwt-abc".to_string(),
            user: User {
                id: 7,
                username: "luna".to_string(),
                email: "luna@example.com".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::in_data_dir(dir.path());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_load_clear() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::in_data_dir(&dir.path().join("nested"));

        store.save(&stored()).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.token, "jwt-abc");
        assert_eq!(loaded.user.id, 7);

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        // Clearing again is fine.
        store.clear().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::in_data_dir(dir.path());
        store.save(&stored()).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_storage_error() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::in_data_dir(dir.path());
        tokio::fs::write(store.path(), "{not json").await.unwrap();
        assert!(matches!(store.load().await, Err(ChatError::Storage(_))));
    }
}
