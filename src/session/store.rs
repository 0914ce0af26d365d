use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::io::AsyncWriteExt;

use super::keyring::KeyringStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("keyring: {0}")]
    Keyring(String),
    #[error("token file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Durable home of the bearer token between runs.
pub trait CredentialStore: Send + Sync + 'static {
    fn load(&self) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;
    fn save(&self, token: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
    fn clear(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Token kept in a single file, e.g. `~/.local/share/taskdeck/token`.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("taskdeck")
            .join("token")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CredentialStore for FileStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn save(&self, token: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        // `mode` only applies on creation; tighten a file left by an older run.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| self.io_error(e))?;
        }
        file.write_all(token.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// Process-local store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore(Arc<Mutex<Option<String>>>);

impl MemoryStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self(Arc::new(Mutex::new(Some(token.into()))))
    }

    pub fn token(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl CredentialStore for MemoryStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.token())
    }

    async fn save(&self, token: &str) -> Result<(), StoreError> {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Store picked at startup from the `credential_backend` setting.
#[derive(Debug, Clone)]
pub enum ConfiguredStore {
    Keyring(KeyringStore),
    File(FileStore),
}

impl CredentialStore for ConfiguredStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        match self {
            Self::Keyring(store) => store.load().await,
            Self::File(store) => store.load().await,
        }
    }

    async fn save(&self, token: &str) -> Result<(), StoreError> {
        match self {
            Self::Keyring(store) => store.save(token).await,
            Self::File(store) => store.save(token).await,
        }
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match self {
            Self::Keyring(store) => store.clear().await,
            Self::File(store) => store.clear().await,
        }
    }
}
