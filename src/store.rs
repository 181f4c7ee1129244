//! Persistence of trained models

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sidecar written next to every stored model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    /// Human-readable model kind, e.g. "Random Forest"
    pub kind: String,
    /// Input columns, in the order the model expects them
    pub feature_names: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Destination for trained models
pub trait ModelStore {
    /// Persist `model` under `destination` and return where it was written
    fn save<M: Serialize>(&self, model: &M, manifest: &ModelManifest, destination: &str) -> Result<PathBuf>;
}

/// Stores models as pretty-printed JSON files in one directory
#[derive(Debug, Clone)]
pub struct JsonModelStore {
    dir: PathBuf,
}

impl JsonModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the manifest belonging to a model file
    pub fn manifest_path(model_path: &Path) -> PathBuf {
        let mut name = model_path.file_name().unwrap_or_default().to_os_string();
        name.push(".meta.json");
        model_path.with_file_name(name)
    }

    /// Read back a model written by [`ModelStore::save`]
    pub fn load<M: for<'de> Deserialize<'de>>(&self, destination: &str) -> Result<M> {
        let json = std::fs::read_to_string(self.dir.join(destination))?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn load_manifest(&self, destination: &str) -> Result<ModelManifest> {
        let path = Self::manifest_path(&self.dir.join(destination));
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl ModelStore for JsonModelStore {
    fn save<M: Serialize>(&self, model: &M, manifest: &ModelManifest, destination: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(destination);

        std::fs::write(&path, serde_json::to_string_pretty(model)?)?;
        std::fs::write(Self::manifest_path(&path), serde_json::to_string_pretty(manifest)?)?;

        tracing::info!(path = %path.display(), kind = %manifest.kind, "model saved");
        Ok(path)
    }
}
