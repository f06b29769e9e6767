use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "doorbell-tui";
const PREFERENCES_FILE: &str = "preferences.json";

/// Small key/value preference file. Each save rewrites the whole map.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn open_default() -> Result<Self> {
        Ok(Self::at(scoped_path(PREFERENCES_FILE)?))
    }

    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[cfg(test)]
    fn path(&self) -> &Path {
        &self.path
    }

    /// Reads `key`, falling back to `default` when the file, the key or the
    /// value is missing or unreadable.
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.try_load(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(err) => {
                tracing::warn!(key, error = %format!("{err:#}"), "failed loading preference");
                default
            }
        }
    }

    pub fn try_load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let map = self.read_map()?;
        let Some(value) = map.get(key) else {
            return Ok(None);
        };
        let parsed = serde_json::from_value(value.clone())
            .with_context(|| format!("preference '{key}' has an unexpected shape"))?;
        Ok(Some(parsed))
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        // A corrupt file is replaced rather than blocking every later save.
        let mut map = self.read_map().unwrap_or_default();
        let encoded = serde_json::to_value(value)
            .with_context(|| format!("failed serializing preference '{key}'"))?;
        map.insert(key.to_owned(), encoded);

        ensure_parent_dir(&self.path)?;
        let payload = serde_json::to_string_pretty(&Value::Object(map))
            .context("failed serializing preferences")?;
        fs::write(&self.path, payload)
            .with_context(|| format!("failed writing preferences at {}", self.path.display()))?;
        Ok(())
    }

    fn read_map(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading preferences at {}", self.path.display()))?;
        serde_json::from_str::<Map<String, Value>>(&raw)
            .with_context(|| format!("failed parsing preferences at {}", self.path.display()))
    }
}

pub fn default_log_path() -> Result<PathBuf> {
    scoped_path("doorbell-tui.log")
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating data directory {}", parent.display()))?;
    }
    Ok(())
}

fn data_root() -> Result<PathBuf> {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .context("unable to determine user data directory")
}

fn scoped_path(file: &str) -> Result<PathBuf> {
    Ok(data_root()?.join(APP_DIR).join(file))
}
