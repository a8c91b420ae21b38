//! Model location and loading configuration.
//!
//! Read from an optional JSON file; every field has a default so a partial
//! file (or none at all) is valid. The CLI layers its flags on top.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::artifact::ArtifactTier;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Where artifacts live and how sessions are built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    pub fresh_model: String,
    pub compatible_model: String,
    pub original_model: String,
    /// Headless pretrained backbone used by the synthesized fallback.
    pub feature_extractor: String,
    /// Operator libraries registered by strategies that keep the custom
    /// operator registry. Relative paths resolve against `model_dir`.
    pub custom_op_libraries: Vec<PathBuf>,
    /// Intra-op thread count for each session; 0 leaves the runtime default.
    pub intra_threads: usize,
    pub head: HeadConfig,
}

/// Options for the randomly initialised head of the synthesized network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadConfig {
    /// Seed for head initialisation. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            fresh_model: ArtifactTier::Fresh.default_file_name().to_string(),
            compatible_model: ArtifactTier::Compatible.default_file_name().to_string(),
            original_model: ArtifactTier::Original.default_file_name().to_string(),
            feature_extractor: "efficientnet_b0_notop.onnx".to_string(),
            custom_op_libraries: Vec::new(),
            intra_threads: 0,
            head: HeadConfig::default(),
        }
    }
}

impl ModelConfig {
    /// Load a config from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded model config");
        Ok(config)
    }

    /// Full path of the artifact for a tier.
    pub fn artifact_path(&self, tier: ArtifactTier) -> PathBuf {
        let name = match tier {
            ArtifactTier::Fresh => &self.fresh_model,
            ArtifactTier::Compatible => &self.compatible_model,
            ArtifactTier::Original => &self.original_model,
        };
        self.model_dir.join(name)
    }

    pub fn feature_extractor_path(&self) -> PathBuf {
        self.model_dir.join(&self.feature_extractor)
    }

    pub fn custom_op_library_paths(&self) -> Vec<PathBuf> {
        self.custom_op_libraries
            .iter()
            .map(|p| self.model_dir.join(p))
            .collect()
    }
}
