//! Catalogue of candidate model artifacts and the strategies used to load them.
//!
//! The resolver walks [`ARTIFACT_CHAIN`] in order, trying each artifact with
//! each of its strategies, before falling back to a synthesized network.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical tier of a serialized model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactTier {
    /// Saved with the currently deployed runtime.
    Fresh,
    /// Previously re-saved in a normalized format.
    Compatible,
    /// The originally trained model, possibly from an older runtime.
    Original,
}

impl ArtifactTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Compatible => "compatible",
            Self::Original => "original",
        }
    }

    /// File name looked up under the model directory when not overridden.
    pub fn default_file_name(&self) -> &'static str {
        match self {
            Self::Fresh => "diabetic_model_fresh.onnx",
            Self::Compatible => "diabetic_model_compatible.onnx",
            Self::Original => "diabetic_model.onnx",
        }
    }
}

impl fmt::Display for ArtifactTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialization format an artifact is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatVersion {
    Current,
    Normalized,
    Legacy,
}

/// How a session is configured when loading an artifact.
///
/// "Compiled state" is the runtime's graph optimisation pass; the custom
/// operator registry is the set of operator libraries named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadStrategy {
    Plain,
    WithoutCompiledState,
    EmptyCustomOpRegistry,
    /// Both `WithoutCompiledState` and `EmptyCustomOpRegistry`.
    Bare,
}

impl LoadStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::WithoutCompiledState => "without-compiled-state",
            Self::EmptyCustomOpRegistry => "empty-custom-op-registry",
            Self::Bare => "bare",
        }
    }

    pub fn skips_compiled_state(&self) -> bool {
        matches!(self, Self::WithoutCompiledState | Self::Bare)
    }

    pub fn registers_custom_ops(&self) -> bool {
        matches!(self, Self::Plain | Self::WithoutCompiledState)
    }
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate source for the trained classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelArtifact {
    pub tier: ArtifactTier,
    pub format: FormatVersion,
    /// Strategies in the order they are attempted; each one runs only if
    /// the previous one failed.
    pub strategies: &'static [LoadStrategy],
}

impl ModelArtifact {
    pub fn identifier(&self) -> &'static str {
        self.tier.as_str()
    }
}

/// Ordered candidate artifacts, most preferred first.
pub static ARTIFACT_CHAIN: [ModelArtifact; 3] = [
    ModelArtifact {
        tier: ArtifactTier::Fresh,
        format: FormatVersion::Current,
        strategies: &[LoadStrategy::Plain],
    },
    ModelArtifact {
        tier: ArtifactTier::Compatible,
        format: FormatVersion::Normalized,
        strategies: &[LoadStrategy::Plain],
    },
    ModelArtifact {
        tier: ArtifactTier::Original,
        format: FormatVersion::Legacy,
        strategies: &[
            LoadStrategy::Plain,
            LoadStrategy::WithoutCompiledState,
            LoadStrategy::EmptyCustomOpRegistry,
            LoadStrategy::Bare,
        ],
    },
];

/// Which path through the fallback chain produced the resolved model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Provenance {
    Artifact {
        tier: ArtifactTier,
        strategy: LoadStrategy,
    },
    /// Pretrained feature extractor with a randomly initialised head.
    Synthesized,
}

impl Provenance {
    pub fn is_synthesized(&self) -> bool {
        matches!(self, Self::Synthesized)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Artifact { tier, strategy } => write!(f, "{tier}/{strategy}"),
            Self::Synthesized => f.write_str("synthesized"),
        }
    }
}
