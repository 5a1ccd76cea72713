//! Persisted credential stores.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::auth::{CredentialStore, Credentials};

use super::error::InfraError;

/// On-disk layout. Either key may be missing in a hand-edited file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

/// JSON file holding `token` and `email`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, InfraError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let stored: StoredCredentials = serde_json::from_str(&raw).map_err(|err| {
            InfraError::credentials(format!("{}: {err}", self.path.display()))
        })?;
        match (stored.token, stored.email) {
            (Some(token), Some(email)) if !token.is_empty() && !email.is_empty() => {
                Ok(Some(Credentials { token, email }))
            }
            _ => {
                debug!(path = %self.path.display(), "Ignoring incomplete stored credentials");
                Ok(None)
            }
        }
    }

    fn save(&self, credentials: &Credentials) -> Result<(), InfraError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let stored = StoredCredentials {
            token: Some(credentials.token.clone()),
            email: Some(credentials.email.clone()),
        };
        let body = serde_json::to_string_pretty(&stored)
            .map_err(|err| InfraError::credentials(err.to_string()))?;
        fs::write(&self.path, body)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), InfraError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Process-local store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(credentials: Credentials) -> Self {
        Self {
            inner: Mutex::new(Some(credentials)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, InfraError> {
        Ok(self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, credentials: &Credentials) -> Result<(), InfraError> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), InfraError> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
