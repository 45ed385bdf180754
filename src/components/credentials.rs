use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::{Path, PathBuf};

use super::history::StoreError;
use crate::{log_info, log_warn};

pub const KEY_FILE_NAME: &str = "refpaint_key";

/// Gemini keys: "AIzaSy" then 33 URL-safe characters.
pub fn validate_api_key(key: &str) -> bool {
    let Some(rest) = key.strip_prefix("AIzaSy") else { return false };
    rest.len() == 33
        && rest
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    Empty,
    Malformed,
    Store(String),
}

impl std::fmt::Display for CredentialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialError::Empty => write!(f, "Please enter an API key"),
            CredentialError::Malformed => write!(f, "That does not look like a valid API key"),
            CredentialError::Store(e) => write!(f, "Could not store the API key: {}", e),
        }
    }
}

impl std::error::Error for CredentialError {}

impl From<StoreError> for CredentialError {
    fn from(e: StoreError) -> Self {
        CredentialError::Store(e.to_string())
    }
}

/// Holds one secret string. How it is kept at rest is up to the store.
pub trait CredentialStore {
    fn get(&self) -> Option<String>;
    fn set(&mut self, secret: &str) -> Result<(), StoreError>;
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// Validate then store a user-entered key.
pub fn save_api_key(store: &mut dyn CredentialStore, key: &str) -> Result<(), CredentialError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(CredentialError::Empty);
    }
    if !validate_api_key(key) {
        return Err(CredentialError::Malformed);
    }
    store.set(key)?;
    log_info!("API key saved");
    Ok(())
}

#[derive(Clone, Debug, Default)]
pub struct MemoryCredentialStore {
    secret: Option<String>,
}

impl MemoryCredentialStore {
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<String> {
        self.secret.clone()
    }

    fn set(&mut self, secret: &str) -> Result<(), StoreError> {
        self.secret = Some(secret.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.secret = None;
        Ok(())
    }
}

/// Keeps the secret base64-encoded in a single file. This only keeps the key
/// from being readable at a glance; it is not encryption.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    secret: Option<String>,
}

impl FileCredentialStore {
    pub fn default_path() -> Option<PathBuf> {
        crate::settings::config_dir().map(|d| d.join(KEY_FILE_NAME))
    }

    /// Load the stored key, if any. Entries that fail to decode are deleted.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let secret = match std::fs::read_to_string(&path) {
            Ok(encoded) => match decode_secret(encoded.trim()) {
                Some(s) => Some(s),
                None => {
                    log_warn!("Stored API key was unreadable and has been removed");
                    let _ = std::fs::remove_file(&path);
                    None
                }
            },
            Err(_) => None,
        };
        Self { path, secret }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn decode_secret(encoded: &str) -> Option<String> {
    let raw = STANDARD.decode(encoded).ok()?;
    let s = String::from_utf8(raw).ok()?;
    (!s.is_empty()).then_some(s)
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<String> {
        self.secret.clone()
    }

    fn set(&mut self, secret: &str) -> Result<(), StoreError> {
        std::fs::write(&self.path, STANDARD.encode(secret.as_bytes()))?;
        self.secret = Some(secret.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.secret = None;
        Ok(())
    }
}
