use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use anyhow::Context;
use indexmap::IndexMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::warn;

pub const CHALLENGE_KEY: &str = "challenge:";
pub const TEAM_KEY: &str = "team:";
pub const FLAG_KEY: &str = "flag:";
pub const TOKEN_KEY: &str = "token:";
pub const SYNCED_KEY: &str = "synced:";

/// Flat key-value state of a workspace, kept in insertion order and
/// optionally backed by a JSON file.
#[derive(Debug, Default)]
pub struct WorkspaceState {
    entries: IndexMap<String, Value>,
    path: Option<PathBuf>,
    dirty: bool,
}

impl WorkspaceState {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens the state file at `path`, starting empty if it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let entries = if path.exists() {
            serde_json::from_reader(File::open(path)?)
                .with_context(|| format!("could not parse {}", path.display()))?
        } else {
            IndexMap::new()
        };

        Ok(Self {
            entries,
            path: Some(path.to_owned()),
            dirty: false,
        })
    }

    /// Returns `None` for missing keys and for values that no longer fit `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.entries.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("ignoring unreadable state entry {}: {}", key, err);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> serde_json::Result<()> {
        let value = serde_json::to_value(value)?;
        self.entries.insert(key.into(), value);
        self.dirty = true;
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn delete(&mut self, key: &str) {
        if self.entries.shift_remove(key).is_some() {
            self.dirty = true;
        }
    }

    /// Writes the state back to its file if anything changed.
    pub fn save(&mut self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        serde_json::to_writer_pretty(File::create(&tmp)?, &self.entries)
            .context("could not write state file")?;
        fs::rename(&tmp, path).context("could not replace state file")?;

        self.dirty = false;
        Ok(())
    }
}

pub fn key(prefix: &str, id: &str) -> String {
    format!("{prefix}{id}")
}
