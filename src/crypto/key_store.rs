use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{ Path, PathBuf };
use tokio::sync::{ Mutex, RwLock };

use crate::error::{ AppError, Result };

/// Narrow get/set contract over a platform keystore.
///
/// Values are opaque strings; the store never interprets them.
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    async fn set_item(&self, key: &str, value: &str) -> Result<()>;

    async fn remove_item(&self, key: &str) -> Result<()>;
}

/// Process-local store. Contents vanish with the process.
#[derive(Default)]
pub struct MemoryKeyStore {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.items.write().await.remove(key);
        Ok(())
    }
}

/// JSON map persisted to a single file readable only by the owner.
pub struct FileKeyStore {
    path: PathBuf,
    // Serializes read-modify-write cycles against the file
    lock: Mutex<()>,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) =>
                serde_json
                    ::from_slice(&bytes)
                    .map_err(|e| AppError::KeyStore(format!("Corrupt key store file: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(AppError::KeyStore(format!("Failed to read key store: {}", e))),
        }
    }

    async fn save(&self, items: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs
                    ::create_dir_all(parent).await
                    .map_err(|e| AppError::KeyStore(format!("Failed to create key store dir: {}", e)))?;
            }
        }

        let bytes = serde_json
            ::to_vec(items)
            .map_err(|e| AppError::KeyStore(format!("Failed to serialize key store: {}", e)))?;

        // Replace atomically via a sibling file
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs
            ::write(&tmp_path, bytes).await
            .map_err(|e| AppError::KeyStore(format!("Failed to write key store: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs
                ::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600)).await
                .map_err(|e| AppError::KeyStore(format!("Failed to set permissions: {}", e)))?;
        }

        tokio::fs
            ::rename(&tmp_path, &self.path).await
            .map_err(|e| AppError::KeyStore(format!("Failed to replace key store: {}", e)))
    }
}

#[async_trait]
impl KeyStore for FileKeyStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;
        items.insert(key.to_string(), value.to_string());
        self.save(&items).await
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;
        if items.remove(key).is_some() {
            self.save(&items).await?;
        }
        Ok(())
    }
}
