//! Persistence for the backend's active account.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::account::Account;
use super::error::BridgeError;

const ACCOUNT_FILE_NAME: &str = "account.toml";
const ACCOUNT_FILE_VERSION: u32 = 1;

/// Errors raised by an [`AccountStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Unsupported account file version {0}")]
    UnsupportedVersion(u32),
}

impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for StoreError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<StoreError> for BridgeError {
    fn from(error: StoreError) -> Self {
        BridgeError::backend(error.to_string())
    }
}

/// Storage abstraction for the single active account.
pub trait AccountStore: Send + Sync {
    fn load(&self) -> Result<Option<Account>, StoreError>;
    fn save(&self, account: &Account) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// File-backed account store using a TOML file.
///
/// # Example
/// ```no_run
/// use launcher_auth::auth::{Account, AccountStore, FileAccountStore};
///
/// let store = FileAccountStore::new("/tmp/launcher-auth");
/// store.save(&Account::offline("Steve"))?;
/// # Ok::<(), launcher_auth::auth::StoreError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileAccountStore {
    base_dir: PathBuf,
}

impl FileAccountStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.base_dir.join(ACCOUNT_FILE_NAME)
    }

    fn ensure_parent(path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl AccountStore for FileAccountStore {
    fn load(&self) -> Result<Option<Account>, StoreError> {
        let raw = match fs::read_to_string(self.path()) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let file: AccountFile = toml::from_str(&raw)?;
        if file.version != ACCOUNT_FILE_VERSION {
            return Err(StoreError::UnsupportedVersion(file.version));
        }
        Ok(Some(file.account))
    }

    fn save(&self, account: &Account) -> Result<(), StoreError> {
        let path = self.path();
        Self::ensure_parent(&path)?;
        let file = AccountFile {
            version: ACCOUNT_FILE_VERSION,
            saved_at: Utc::now(),
            account: account.clone(),
        };
        let serialized = toml::to_string(&file)?;
        fs::write(&path, serialized)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccountFile {
    version: u32,
    saved_at: DateTime<Utc>,
    account: Account,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, FileAccountStore) {
        let dir = TempDir::new().unwrap();
        let store = FileAccountStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn load_returns_none_when_missing() {
        let (_dir, store) = temp_store();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn offline_account_survives_save_and_load() {
        let (_dir, store) = temp_store();
        let account = Account::offline("Steve");
        store.save(&account).unwrap();
        assert_eq!(store.load().unwrap(), Some(account));
    }

    #[test]
    fn microsoft_session_is_kept_opaque() {
        let (_dir, store) = temp_store();
        let account = Account::microsoft(
            "Notch",
            "oid-1",
            json!({ "access_token": "at", "expires_at": "2030-01-01T00:00:00Z" }),
        );
        store.save(&account).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.session.unwrap()["access_token"], "at");
    }

    #[test]
    fn clear_is_idempotent() {
        let (_dir, store) = temp_store();
        store.save(&Account::offline("Alex")).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn unknown_version_is_rejected() {
        let (dir, store) = temp_store();
        fs::write(
            dir.path().join(ACCOUNT_FILE_NAME),
            "version = 9\nsaved_at = \"2024-01-01T00:00:00Z\"\n\n[account]\ntype = \"offline\"\nusername = \"Steve\"\nuuid = \"x\"\n",
        )
        .unwrap();
        assert!(matches!(
            store.load(),
            Err(StoreError::UnsupportedVersion(9))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, store) = temp_store();
        store.save(&Account::offline("Steve")).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
