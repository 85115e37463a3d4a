//! Local state that must survive process restarts and network loss
//!
//! Holds exactly one value: the local kiosk lock. Writes are synchronous and
//! atomic so the flag can be relied on right after `set` returns.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    local_kiosk_lock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct LocalStateCache {
    path: PathBuf,
}

impl LocalStateCache {
    /// Cache under the default data directory
    pub fn new() -> crate::error::Result<Self> {
        Ok(Self::new_in(crate::config::data_dir()?))
    }

    pub fn new_in(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: root_dir.into().join("state.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted lock. A missing or empty file reads as unlocked.
    pub fn load(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file: {:?}", self.path))?;
        if content.trim().is_empty() {
            return Ok(false);
        }

        let parsed: StateFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {:?}", self.path))?;
        Ok(parsed.local_kiosk_lock)
    }

    /// Like [`load`](Self::load), but an unreadable file counts as unlocked
    pub fn load_or_unlocked(&self) -> bool {
        match self.load() {
            Ok(locked) => locked,
            Err(e) => {
                tracing::warn!("Ignoring unreadable local state: {:#}", e);
                false
            }
        }
    }

    pub fn set(&self, locked: bool) -> Result<()> {
        let file = StateFile {
            local_kiosk_lock: locked,
            updated_at: Some(Utc::now()),
        };
        let content =
            serde_json::to_string_pretty(&file).context("Failed to serialize state file")?;
        atomic_write(&self.path, content.as_bytes())
            .with_context(|| format!("Failed to atomically write state file: {:?}", self.path))
    }
}

fn atomic_write(dest: &Path, bytes: &[u8]) -> Result<()> {
    let parent = dest
        .parent()
        .context("Destination path has no parent directory")?;
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create parent dir: {:?}", parent))?;

    let tmp = dest.with_extension(format!("tmp.{}", uuid::Uuid::new_v4()));

    // Data must be on disk before the rename, or a power loss can leave an empty file
    let written = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .with_context(|| format!("Failed to write temp file: {:?}", tmp));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    if let Err(rename_err) = fs::rename(&tmp, dest) {
        let _ = fs::remove_file(&tmp);
        return Err(rename_err).context("Failed to rename temp file into place");
    }

    sync_dir(parent);
    Ok(())
}

/// Persist the rename itself. Best-effort.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        tracing::debug!("Failed to sync state dir {:?}: {}", dir, e);
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
