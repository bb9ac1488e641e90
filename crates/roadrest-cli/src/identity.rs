//! Local identity provider: file-based credentials and session.
//!
//! Credentials (salted SHA-256 hashes) live in
//! `~/.config/roadrest/credentials.toml`; the active session is the
//! user id stored in `session`. This is an app-level adapter -- the
//! core only ever sees the [`IdentityProvider`] trait.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use roadrest_core::error::CoreError;
use roadrest_core::observable::Observable;
use roadrest_core::providers::IdentityProvider;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialEntry {
    user_id: String,
    salt: String,
    hash: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    users: HashMap<String, CredentialEntry>,
}

pub struct LocalIdentity {
    credentials_path: PathBuf,
    session_path: PathBuf,
    signal: Observable<Option<String>>,
    store: Mutex<CredentialFile>,
}

impl LocalIdentity {
    /// Open the provider over the shared data directory.
    pub fn open() -> Result<Self, CoreError> {
        let dir = roadrest_core::storage::data_dir()?;
        Self::open_at(&dir)
    }

    /// Open the provider over an explicit directory (tests).
    pub fn open_at(dir: &Path) -> Result<Self, CoreError> {
        let credentials_path = dir.join("credentials.toml");
        let store = if credentials_path.exists() {
            let raw = std::fs::read_to_string(&credentials_path)?;
            toml::from_str(&raw).map_err(|e| CoreError::Auth(format!("credential store corrupt: {e}")))?
        } else {
            CredentialFile::default()
        };
        Ok(Self {
            credentials_path,
            session_path: dir.join("session"),
            signal: Observable::new(None),
            store: Mutex::new(store),
        })
    }

    /// Re-emit a stored session, if any. Call after the manager graph is
    /// wired so subscribers see the restored user.
    pub fn resume(&self) {
        if let Ok(raw) = std::fs::read_to_string(&self.session_path) {
            let id = raw.trim();
            if !id.is_empty() {
                tracing::debug!(user_id = %id, "restoring stored session");
                self.signal.set(Some(id.to_string()));
            }
        }
    }

    pub fn has_session(&self) -> bool {
        self.session_path.exists()
    }

    fn persist(&self, store: &CredentialFile) -> Result<(), CoreError> {
        let raw = toml::to_string_pretty(store)
            .map_err(|e| CoreError::Auth(format!("credential store not serializable: {e}")))?;
        std::fs::write(&self.credentials_path, raw)?;
        Ok(())
    }

    fn write_session(&self, user_id: &str) -> Result<(), CoreError> {
        std::fs::write(&self.session_path, user_id)?;
        Ok(())
    }

    fn hash_password(salt: &[u8], password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn lock(&self) -> MutexGuard<'_, CredentialFile> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    fn signal(&self) -> Observable<Option<String>> {
        self.signal.clone()
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<String, CoreError> {
        let user_id = {
            let store = self.lock();
            let entry = store
                .users
                .get(email)
                .ok_or_else(|| CoreError::Auth("unknown account".into()))?;
            let salt = hex::decode(&entry.salt)
                .map_err(|_| CoreError::Auth("credential store corrupt".into()))?;
            if Self::hash_password(&salt, password) != entry.hash {
                return Err(CoreError::Auth("wrong password".into()));
            }
            entry.user_id.clone()
        };
        self.write_session(&user_id)?;
        self.signal.set(Some(user_id.clone()));
        Ok(user_id)
    }

    async fn register(
        &self,
        email: &str,
        password: &str,
        _name: &str,
    ) -> Result<String, CoreError> {
        let user_id = {
            let mut store = self.lock();
            if store.users.contains_key(email) {
                return Err(CoreError::Auth("an account with this email already exists".into()));
            }
            let mut salt = [0u8; 16];
            getrandom::fill(&mut salt).map_err(|e| CoreError::Auth(e.to_string()))?;
            let user_id = Uuid::new_v4().to_string();
            store.users.insert(
                email.to_string(),
                CredentialEntry {
                    user_id: user_id.clone(),
                    salt: hex::encode(salt),
                    hash: Self::hash_password(&salt, password),
                },
            );
            self.persist(&store)?;
            user_id
        };
        self.write_session(&user_id)?;
        self.signal.set(Some(user_id.clone()));
        Ok(user_id)
    }

    async fn sign_out(&self) {
        let _ = std::fs::remove_file(&self.session_path);
        self.signal.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_authenticate_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalIdentity::open_at(dir.path()).unwrap();
        let id = provider.register("a@b.c", "hunter2", "A").await.unwrap();
        assert_eq!(provider.signal().get(), Some(id.clone()));

        provider.sign_out().await;
        assert_eq!(provider.signal().get(), None);

        let again = provider.authenticate("a@b.c", "hunter2").await.unwrap();
        assert_eq!(again, id);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalIdentity::open_at(dir.path()).unwrap();
        provider.register("a@b.c", "hunter2", "A").await.unwrap();
        provider.sign_out().await;
        assert!(provider.authenticate("a@b.c", "letmein").await.is_err());
        assert_eq!(provider.signal().get(), None);
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalIdentity::open_at(dir.path()).unwrap();
        provider.register("a@b.c", "hunter2", "A").await.unwrap();
        assert!(provider.register("a@b.c", "other", "B").await.is_err());
    }

    #[tokio::test]
    async fn credentials_survive_reopen_and_session_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let provider = LocalIdentity::open_at(dir.path()).unwrap();
            provider.register("a@b.c", "hunter2", "A").await.unwrap()
        };
        let provider = LocalIdentity::open_at(dir.path()).unwrap();
        assert!(provider.has_session());
        provider.resume();
        assert_eq!(provider.signal().get(), Some(id.clone()));
        assert_eq!(provider.authenticate("a@b.c", "hunter2").await.unwrap(), id);
    }
}
