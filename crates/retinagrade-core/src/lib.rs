pub mod artifact;
pub mod config;
pub mod grade;
pub mod prediction;

pub use artifact::{ARTIFACT_CHAIN, ArtifactTier, FormatVersion, LoadStrategy, ModelArtifact, Provenance};
pub use config::{ConfigError, HeadConfig, ModelConfig};
pub use grade::{NUM_GRADES, SEVERITY_LABELS, UNKNOWN_LABEL, label_for};
pub use prediction::PredictionResult;
