//! Durable persistence for the session credential.
//!
//! One file per key under the per-user state directory. The session state
//! machine is the only writer of the credential record; read-only utilities
//! may inspect it. Read failures degrade to "no record" so a broken disk or
//! permissions problem can never take the client down - at worst the user
//! logs in again.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

/// Fixed key the credential record is stored under
const CREDENTIAL_KEY: &str = "credential";

pub struct TokenStore {
    state_dir: PathBuf,
}

impl TokenStore {
    pub fn new(state_dir: PathBuf) -> Self {
        Self { state_dir }
    }

    /// Load the stored credential, if any.
    ///
    /// Storage errors are logged and reported as an absent record.
    pub fn load(&self) -> Option<String> {
        match self.read(CREDENTIAL_KEY) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to read credential record, treating as absent");
                None
            }
        }
    }

    /// Persist the credential under the fixed key
    pub fn save(&self, credential: &str) -> Result<()> {
        self.write(CREDENTIAL_KEY, credential)
    }

    /// Remove the credential record. Idempotent.
    pub fn clear(&self) -> Result<()> {
        self.remove(CREDENTIAL_KEY)
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.state_dir.join(key)
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read record: {}", key))?;
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Ok(Some(trimmed.to_string()))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.state_dir)
            .context("Failed to create state directory")?;
        std::fs::write(self.key_path(key), value)
            .with_context(|| format!("Failed to write record: {}", key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove record: {}", key))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().to_path_buf());

        assert!(store.load().is_none());
        store.save("aaa.bbb.ccc").expect("save should succeed");
        assert_eq!(store.load().as_deref(), Some("aaa.bbb.ccc"));

        store.clear().expect("clear should succeed");
        assert!(store.load().is_none());
        // Clearing again is a no-op
        store.clear().expect("second clear should succeed");
    }

    #[test]
    fn test_save_creates_missing_state_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("deeper").join("state");
        let store = TokenStore::new(nested);

        store.save("tok").expect("save should create the directory");
        assert_eq!(store.load().as_deref(), Some("tok"));
    }

    #[test]
    fn test_blank_record_reads_as_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().to_path_buf());
        store.save("  \n").expect("save");
        assert!(store.load().is_none());
    }
}
