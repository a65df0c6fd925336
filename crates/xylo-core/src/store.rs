//! Small persisted client values (session id, access token).
//!
//! Each value lives in its own file under `$XYLO_HOME`. Writes go through a
//! temp file + rename so a crash never leaves a half-written value behind.
//! Files are owner-only (0600) on unix.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use uuid::Uuid;

/// Writes `content` to `path`, creating parent directories as needed.
///
/// The temp file name is unique per call, so concurrent writers never share
/// one; the last rename wins.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
    let tmp_path = path.with_file_name(tmp_name);

    let written = write_private(&tmp_path, content).and_then(|()| {
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })
    });
    if written.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    written
}

fn write_private(path: &Path, content: &str) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to open {} for writing", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write to {}", path.display()))
}

/// A single trimmed string value persisted in a file.
#[derive(Debug, Clone)]
pub struct PersistedValue {
    path: PathBuf,
}

impl PersistedValue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads the value. Missing files and blank contents read as `None`.
    pub fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let trimmed = contents.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        }
    }

    pub fn write(&self, value: &str) -> Result<()> {
        write_atomic(&self.path, &format!("{}\n", value.trim()))
    }

    /// Removes the value. Removing a missing value is not an error.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove {}", self.path.display()))
            }
        }
    }
}

/// Persisted bearer token obtained from `/token` or `/register`.
#[derive(Debug, Clone)]
pub struct TokenStore {
    value: PersistedValue,
}

impl TokenStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            value: PersistedValue::new(path),
        }
    }

    /// Returns the stored token. Unreadable files count as "not logged in".
    pub fn get(&self) -> Option<String> {
        match self.value.read() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable access token");
                None
            }
        }
    }

    pub fn set(&self, token: &str) -> Result<()> {
        self.value.write(token)
    }

    pub fn clear(&self) -> Result<()> {
        self.value.remove()
    }
}
