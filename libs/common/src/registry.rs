//! Credential registry backed by a single JSON file
//!
//! The file maps usernames to stored credential strings. How a password is
//! turned into a stored credential is delegated to a `CredentialScheme`.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{RegistryError, RegistryResult, StoreError};
use crate::store::sanitize_file_name;

/// Turns passwords into stored credentials and checks them back
pub trait CredentialScheme: Send + Sync {
    /// Produce the credential string to persist for a password
    fn hash(&self, password: &str) -> RegistryResult<String>;

    /// Check a password against a stored credential string
    fn verify(&self, password: &str, stored: &str) -> RegistryResult<bool>;
}

/// Argon2 with default parameters, stored as PHC strings
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Scheme;

impl CredentialScheme for Argon2Scheme {
    fn hash(&self, password: &str) -> RegistryResult<String> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| RegistryError::Hashing(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, stored: &str) -> RegistryResult<bool> {
        let parsed_hash = PasswordHash::new(stored)
            .map_err(|e| RegistryError::Hashing(format!("Failed to parse password hash: {}", e)))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(RegistryError::Hashing(format!("Failed to verify password: {}", e))),
        }
    }
}

type Credentials = BTreeMap<String, String>;

/// Username to credential registry
#[derive(Clone)]
pub struct UserRegistry {
    path: PathBuf,
    scheme: Arc<dyn CredentialScheme>,
    write_lock: Arc<Mutex<()>>,
}

impl UserRegistry {
    /// Open the registry file at `path`, using Argon2 credentials
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_scheme(path, Arc::new(Argon2Scheme))
    }

    /// Open the registry with a custom credential scheme
    pub fn with_scheme(path: impl Into<PathBuf>, scheme: Arc<dyn CredentialScheme>) -> Self {
        Self {
            path: path.into(),
            scheme,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> RegistryResult<Credentials> {
        let _guard = self.write_lock.lock().await;
        self.load_locked().await
    }

    /// Load the registry; a missing file is created empty, a corrupt one reads as empty
    ///
    /// Callers must hold `write_lock`.
    async fn load_locked(&self) -> RegistryResult<Credentials> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => match serde_json::from_slice(&raw) {
                Ok(users) => Ok(users),
                Err(e) => {
                    warn!("Corrupt user registry {}, treating as empty: {}", self.path.display(), e);
                    Ok(Credentials::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let empty = Credentials::new();
                self.save(&empty).await?;
                Ok(empty)
            }
            Err(e) => Err(StoreError::Io(e).into()),
        }
    }

    async fn save(&self, users: &Credentials) -> RegistryResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(StoreError::Io)?;
        }
        let body = serde_json::to_vec_pretty(users).map_err(StoreError::Serialization)?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(StoreError::Io)?;
        Ok(())
    }

    /// Register a new user
    ///
    /// Fails with `RegistryError::AlreadyExists` when the username is taken,
    /// or when it names the same history files as an existing user.
    pub async fn register(&self, username: &str, password: &str) -> RegistryResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut users = self.load_locked().await?;

        let file_name = sanitize_file_name(username);
        if users
            .keys()
            .any(|existing| existing == username || sanitize_file_name(existing) == file_name)
        {
            return Err(RegistryError::AlreadyExists);
        }

        let credential = self.scheme.hash(password)?;
        users.insert(username.to_string(), credential);
        self.save(&users).await?;

        info!("Registered user: {}", username);
        Ok(())
    }

    /// Check a username/password pair
    ///
    /// Unknown users and malformed stored credentials both yield `false`.
    pub async fn authenticate(&self, username: &str, password: &str) -> RegistryResult<bool> {
        let users = self.load().await?;

        let Some(stored) = users.get(username) else {
            return Ok(false);
        };

        match self.scheme.verify(password, stored) {
            Ok(valid) => Ok(valid),
            Err(e) => {
                warn!("Rejecting unusable credential for {}: {}", username, e);
                Ok(false)
            }
        }
    }

    /// Whether a username is registered
    pub async fn exists(&self, username: &str) -> RegistryResult<bool> {
        Ok(self.load().await?.contains_key(username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_argon2_scheme_round_trip() {
        let scheme = Argon2Scheme;
        let hash = scheme.hash("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(scheme.verify("hunter2", &hash).unwrap());
        assert!(!scheme.verify("hunter3", &hash).unwrap());
    }

    #[test]
    fn test_argon2_scheme_rejects_plaintext_credential() {
        assert!(Argon2Scheme.verify("secret", "secret").is_err());
    }

    #[tokio::test]
    async fn test_register_and_authenticate() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let registry = UserRegistry::new(dir.path().join("users.json"));

        registry.register("alice", "wonderland").await?;

        assert!(registry.authenticate("alice", "wonderland").await?);
        assert!(!registry.authenticate("alice", "looking-glass").await?);
        assert!(!registry.authenticate("bob", "wonderland").await?);

        let raw = std::fs::read_to_string(registry.path())?;
        assert!(!raw.contains("wonderland"));
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_registration_fails() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let registry = UserRegistry::new(dir.path().join("users.json"));

        registry.register("alice", "first").await?;
        let second = registry.register("alice", "second").await;

        assert!(matches!(second, Err(RegistryError::AlreadyExists)));
        assert!(registry.authenticate("alice", "first").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_registration_rejects_colliding_file_names() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let registry = UserRegistry::new(dir.path().join("users.json"));

        registry.register("jane doe", "first").await?;
        let second = registry.register("jane_doe", "second").await;
        let third = registry.register("jane/doe", "third").await;

        assert!(matches!(second, Err(RegistryError::AlreadyExists)));
        assert!(matches!(third, Err(RegistryError::AlreadyExists)));
        assert!(!registry.exists("jane_doe").await?);
        registry.register("jane", "fourth").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_first_registration_survives_concurrent_reads() -> anyhow::Result<()> {
        for _ in 0..20 {
            let dir = TempDir::new()?;
            let registry = UserRegistry::new(dir.path().join("users.json"));

            let (registered, _, _) = tokio::join!(
                registry.register("alice", "pw"),
                registry.authenticate("alice", "pw"),
                registry.exists("bob"),
            );
            registered?;

            assert!(registry.authenticate("alice", "pw").await?);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_is_created_empty() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let registry = UserRegistry::new(dir.path().join("users.json"));

        assert!(!registry.exists("anyone").await?);
        assert_eq!(std::fs::read_to_string(registry.path())?.trim(), "{}");
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_empty() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("users.json");
        std::fs::write(&path, b"[broken")?;
        let registry = UserRegistry::new(&path);

        assert!(!registry.authenticate("alice", "pw").await?);
        registry.register("alice", "pw").await?;
        assert!(registry.authenticate("alice", "pw").await?);
        Ok(())
    }
}
