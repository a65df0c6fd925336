//! Client session identity.
//!
//! The session id scopes every backend call to one client installation. It is
//! created lazily on first use, persisted, and only ever replaced by `clear`.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use uuid::Uuid;

use crate::store::PersistedValue;

/// Id returned when there is no interactive client context to persist into.
pub const DETACHED_SESSION_ID: &str = "server-side-render";

/// Owns the durable client session id.
#[derive(Debug)]
pub struct SessionStore {
    storage: Option<PersistedValue>,
    /// Read-or-create happens under this lock so the id is generated at most once.
    cached: Mutex<Option<String>>,
}

impl SessionStore {
    /// Opens a store persisted at `path`. Nothing is read until `get_id`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            storage: Some(PersistedValue::new(path)),
            cached: Mutex::new(None),
        }
    }

    /// A store for non-interactive contexts: always yields [`DETACHED_SESSION_ID`].
    pub fn detached() -> Self {
        Self {
            storage: None,
            cached: Mutex::new(None),
        }
    }

    pub fn is_detached(&self) -> bool {
        self.storage.is_none()
    }

    /// Returns the persisted id, generating and persisting a new v4 UUID if absent.
    ///
    /// Never fails: if the id cannot be persisted it is still kept for the
    /// lifetime of this store.
    pub fn get_id(&self) -> String {
        let Some(storage) = &self.storage else {
            return DETACHED_SESSION_ID.to_string();
        };

        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = cached.as_ref() {
            return id.clone();
        }

        let id = match storage.read() {
            Ok(Some(existing)) => existing,
            Ok(None) => Self::create(storage),
            Err(e) => {
                tracing::warn!(error = %e, "session id unreadable, generating a new one");
                Self::create(storage)
            }
        };
        *cached = Some(id.clone());
        id
    }

    /// Forgets the current id. The next `get_id` generates a fresh one.
    pub fn clear(&self) -> Result<()> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        *cached = None;
        match &self.storage {
            Some(storage) => storage.remove(),
            None => Ok(()),
        }
    }

    /// Generates and persists a new id, then adopts whatever ended up on disk
    /// so a process racing on first use converges on a single id.
    fn create(storage: &PersistedValue) -> String {
        let id = Uuid::new_v4().to_string();
        if let Err(e) = storage.write(&id) {
            tracing::warn!(error = %e, "failed to persist session id");
            return id;
        }
        match storage.read() {
            Ok(Some(persisted)) => {
                tracing::info!(session_id = %persisted, "new session created");
                persisted
            }
            Ok(None) | Err(_) => id,
        }
    }
}
