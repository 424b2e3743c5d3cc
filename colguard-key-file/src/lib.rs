//! File-based key agent for `colguard`.
//!
//! This agent keeps keys in a single JSON file and is suitable for
//! development and testing. It evaluates no policies: each key carries a
//! `denied` flag that [`FileKeyAgent::deny`] and [`FileKeyAgent::allow`]
//! toggle, so restricted reads can be exercised without a key server.

#![warn(clippy::pedantic, clippy::nursery)]

use base64::{engine::general_purpose::STANDARD, Engine as _};
use colguard::agent::{CreateKeyRequest, Key, KeyAgent, KeyAttributes, COLUMN_NAME_ATTRIBUTE};
use colguard::cipher::generate_key;
use colguard::error::AgentError;
use rand::distributions::Alphanumeric;
use rand::Rng;
use secrecy::{ExposeSecret, SecretVec};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use zeroize::Zeroizing;

const KEY_ID_LEN: usize = 11;

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyStore {
    keys: Vec<StoredKey>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredKey {
    id: String,
    key_ref: String,
    attributes: KeyAttributes,
    /// Base64 key material
    material: String,
    #[serde(default)]
    denied: bool,
}

impl StoredKey {
    fn to_key(&self) -> Result<Key, AgentError> {
        let material = STANDARD
            .decode(&self.material)
            .map_err(|e| AgentError::Store(format!("key {} has invalid material: {e}", self.id)))?;
        Ok(Key::new(self.id.clone(), self.attributes.clone(), SecretVec::new(material)))
    }
}

/// File-backed key agent for development and testing.
///
/// The key store is a JSON document:
/// ```text
/// {
///   "keys": [
///     { "id": "D7GH8aW3kQp", "key_ref": "colguard-zip",
///       "attributes": { "column_name": ["zip"], "classification": ["pi"] },
///       "material": "<base64>", "denied": false }
///   ]
/// }
/// ```
/// The file is rewritten after every change, with 0600 permissions on Unix.
pub struct FileKeyAgent {
    path: PathBuf,
    store: Mutex<KeyStore>,
}

impl FileKeyAgent {
    /// Opens the key store at `path`, starting empty if the file does not
    /// exist yet.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::InitializationFailed` if the file exists but
    /// cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AgentError> {
        let path = path.into();
        let store = if path.exists() {
            let content = Zeroizing::new(std::fs::read(&path).map_err(|e| {
                AgentError::InitializationFailed(format!("cannot read {}: {e}", path.display()))
            })?);
            serde_json::from_slice(&content).map_err(|e| {
                AgentError::InitializationFailed(format!("cannot parse {}: {e}", path.display()))
            })?
        } else {
            debug!("key store {} does not exist yet", path.display());
            KeyStore::default()
        };
        Ok(Self { path, store: Mutex::new(store) })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of keys in the store.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Store` if the store lock is poisoned.
    pub fn key_count(&self) -> Result<usize, AgentError> {
        Ok(self.lock()?.keys.len())
    }

    /// Withholds key `id` from future fetches.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::RequestFailed` for an unknown id, or
    /// `AgentError::Store` if the store cannot be written.
    pub fn deny(&self, id: &str) -> Result<(), AgentError> {
        self.set_denied(id, true)
    }

    /// Makes key `id` fetchable again.
    ///
    /// # Errors
    ///
    /// Same as [`FileKeyAgent::deny`].
    pub fn allow(&self, id: &str) -> Result<(), AgentError> {
        self.set_denied(id, false)
    }

    /// Sets the `denied` flag on every key tagged for `column`.
    ///
    /// Returns how many keys changed.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Store` if the store cannot be written.
    pub fn set_column_denied(&self, column: &str, denied: bool) -> Result<usize, AgentError> {
        let mut store = self.lock()?;
        let mut changed = Vec::new();
        for (index, key) in store.keys.iter_mut().enumerate() {
            if key.attributes.first(COLUMN_NAME_ATTRIBUTE) == Some(column) && key.denied != denied {
                key.denied = denied;
                changed.push(index);
            }
        }
        if let Err(e) = self.persist(&store) {
            for index in changed {
                store.keys[index].denied = !denied;
            }
            return Err(e);
        }
        Ok(changed.len())
    }

    fn set_denied(&self, id: &str, denied: bool) -> Result<(), AgentError> {
        let mut store = self.lock()?;
        let key = store
            .keys
            .iter_mut()
            .find(|key| key.id == id)
            .ok_or_else(|| AgentError::RequestFailed(format!("unknown key {id}")))?;
        let previous = std::mem::replace(&mut key.denied, denied);
        let result = self.persist(&store);
        if result.is_err() {
            if let Some(key) = store.keys.iter_mut().find(|key| key.id == id) {
                key.denied = previous;
            }
        }
        result
    }

    fn lock(&self) -> Result<MutexGuard<'_, KeyStore>, AgentError> {
        self.store.lock().map_err(|_| AgentError::Store("key store lock poisoned".to_string()))
    }

    fn persist(&self, store: &KeyStore) -> Result<(), AgentError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = Zeroizing::new(
            serde_json::to_vec_pretty(store).map_err(|e| AgentError::Store(e.to_string()))?,
        );

        let staging = self.path.with_extension("tmp");
        // A leftover staging file would keep its old mode.
        match std::fs::remove_file(&staging) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&staging)?;
        file.write_all(content.as_slice())?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

fn new_key_id() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(KEY_ID_LEN).map(char::from).collect()
}

#[async_trait::async_trait]
impl KeyAgent for FileKeyAgent {
    async fn create_keys(&self, requests: &[CreateKeyRequest]) -> Result<Vec<Key>, AgentError> {
        let mut store = self.lock()?;
        let mut created = Vec::with_capacity(requests.len());
        let mut stored = Vec::with_capacity(requests.len());
        for request in requests {
            let material = generate_key();
            let entry = StoredKey {
                id: new_key_id(),
                key_ref: request.key_ref.clone(),
                attributes: request.attributes.clone(),
                material: STANDARD.encode(material.expose_secret()),
                denied: false,
            };
            created.push(Key::new(entry.id.clone(), entry.attributes.clone(), material));
            stored.push(entry);
        }
        let kept = store.keys.len();
        store.keys.extend(stored);
        if let Err(e) = self.persist(&store) {
            store.keys.truncate(kept);
            return Err(AgentError::CreationFailed(format!("cannot save new keys: {e}")));
        }
        drop(store);

        info!("created {} key(s)", created.len());
        Ok(created)
    }

    async fn get_keys(&self, ids: &[String]) -> Result<Vec<Key>, AgentError> {
        let store = self.lock()?;
        let keys = ids
            .iter()
            .filter_map(|id| store.keys.iter().find(|key| &key.id == id))
            .filter(|key| !key.denied)
            .map(StoredKey::to_key)
            .collect::<Result<Vec<_>, _>>()?;
        drop(store);

        debug!("{} of {} key(s) granted", keys.len(), ids.len());
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(column: &str) -> CreateKeyRequest {
        CreateKeyRequest::new(
            format!("colguard-{column}"),
            KeyAttributes::new().with(COLUMN_NAME_ATTRIBUTE, column),
        )
    }

    #[tokio::test]
    async fn test_create_and_get_keys() {
        let temp_dir = TempDir::new().unwrap();
        let agent = FileKeyAgent::open(temp_dir.path().join("keystore.json")).unwrap();

        let created = agent.create_keys(&[request("first"), request("zip")]).await.unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].id().len(), KEY_ID_LEN);
        assert!(created[0].id().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(created[1].column_name(), Some("zip"));

        let ids: Vec<String> = created.iter().map(|k| k.id().to_string()).collect();
        let fetched = agent.get_keys(&ids).await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].id(), created[0].id());
    }

    #[tokio::test]
    async fn test_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("keystore.json");

        let agent = FileKeyAgent::open(&path).unwrap();
        let created = agent.create_keys(&[request("last")]).await.unwrap();
        let id = created[0].id().to_string();
        drop(agent);

        let reopened = FileKeyAgent::open(&path).unwrap();
        assert_eq!(reopened.key_count().unwrap(), 1);
        let fetched = reopened.get_keys(&[id]).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].column_name(), Some("last"));
    }

    #[tokio::test]
    async fn test_denied_key_withheld() {
        let temp_dir = TempDir::new().unwrap();
        let agent = FileKeyAgent::open(temp_dir.path().join("keystore.json")).unwrap();
        let created = agent.create_keys(&[request("first"), request("zip")]).await.unwrap();
        let ids: Vec<String> = created.iter().map(|k| k.id().to_string()).collect();

        agent.deny(&ids[1]).unwrap();
        let fetched = agent.get_keys(&ids).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].column_name(), Some("first"));

        agent.allow(&ids[1]).unwrap();
        assert_eq!(agent.get_keys(&ids).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_column_denial() {
        let temp_dir = TempDir::new().unwrap();
        let agent = FileKeyAgent::open(temp_dir.path().join("keystore.json")).unwrap();
        let created = agent.create_keys(&[request("zip"), request("department")]).await.unwrap();
        let ids: Vec<String> = created.iter().map(|k| k.id().to_string()).collect();

        assert_eq!(agent.set_column_denied("zip", true).unwrap(), 1);
        assert_eq!(agent.set_column_denied("zip", true).unwrap(), 0);
        assert_eq!(agent.get_keys(&ids).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_ids_omitted() {
        let temp_dir = TempDir::new().unwrap();
        let agent = FileKeyAgent::open(temp_dir.path().join("keystore.json")).unwrap();
        let fetched = agent.get_keys(&["missing".to_string()]).await.unwrap();
        assert!(fetched.is_empty());
        assert!(matches!(agent.deny("missing"), Err(AgentError::RequestFailed(_))));
    }

    #[tokio::test]
    async fn test_unsaved_keys_discarded() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let agent = FileKeyAgent::open(blocker.join("keystore.json")).unwrap();

        let result = agent.create_keys(&[request("first")]).await;
        assert!(matches!(result, Err(AgentError::CreationFailed(_))));
        assert_eq!(agent.key_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unsaved_denial_reverted() {
        let temp_dir = TempDir::new().unwrap();
        let store_dir = temp_dir.path().join("store");
        let agent = FileKeyAgent::open(store_dir.join("keystore.json")).unwrap();
        let created = agent.create_keys(&[request("zip")]).await.unwrap();
        let ids = vec![created[0].id().to_string()];

        // Replace the store directory with a file so every write fails.
        std::fs::remove_dir_all(&store_dir).unwrap();
        std::fs::write(&store_dir, b"").unwrap();

        assert!(agent.deny(&ids[0]).is_err());
        assert!(agent.set_column_denied("zip", true).is_err());
        assert_eq!(agent.get_keys(&ids).await.unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stale_staging_file_replaced() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("keystore.json");
        let staging = path.with_extension("tmp");
        std::fs::write(&staging, b"stale").unwrap();
        std::fs::set_permissions(&staging, std::fs::Permissions::from_mode(0o644)).unwrap();

        let agent = FileKeyAgent::open(&path).unwrap();
        agent.create_keys(&[request("first")]).await.unwrap();

        assert!(!staging.exists());
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_store_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("keystore.json");
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(FileKeyAgent::open(&path), Err(AgentError::InitializationFailed(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("keystore.json");
        let agent = FileKeyAgent::open(&path).unwrap();
        agent.create_keys(&[request("first")]).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
