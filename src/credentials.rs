// Persistent bearer-token storage. On-device the original client kept
// the token in key-value storage; here it is a small JSON file next to
// the app. Absence of the file (or of the token) is guest mode, never an
// error.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StoredCredentials {
    user_token: Option<String>,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the stored token, or None for guest mode.
    pub fn load_token(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let stored: StoredCredentials = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(stored.user_token.filter(|t| !t.is_empty()))
    }

    pub fn save_token(&self, token: &str) -> Result<()> {
        let stored = StoredCredentials {
            user_token: Some(token.to_string()),
            saved_at: Some(Utc::now()),
        };
        let content = serde_json::to_string_pretty(&stored)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    /// Sign-out: drops the token but keeps the file parseable.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            let content = serde_json::to_string_pretty(&StoredCredentials::default())?;
            fs::write(&self.path, content)
                .with_context(|| format!("Failed to write {}", self.path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> CredentialStore {
        let mut path = std::env::temp_dir();
        path.push(format!("admarket-test-{}-{}.json", name, std::process::id()));
        let _ = fs::remove_file(&path);
        CredentialStore::new(path)
    }

    #[test]
    fn missing_file_is_guest_mode() {
        let store = temp_store("missing");
        assert_eq!(store.load_token().unwrap(), None);
    }

    #[test]
    fn token_round_trips() {
        let store = temp_store("roundtrip");
        store.save_token("abc123").unwrap();
        assert_eq!(store.load_token().unwrap(), Some("abc123".to_string()));
        let _ = fs::remove_file(&store.path);
    }

    #[test]
    fn clear_returns_to_guest_mode() {
        let store = temp_store("clear");
        store.save_token("abc123").unwrap();
        store.clear().unwrap();
        assert_eq!(store.load_token().unwrap(), None);
        let _ = fs::remove_file(&store.path);
    }
}
