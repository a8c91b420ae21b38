//! ONNX Runtime backend for the resolver.
//!
//! Artifacts are complete classifiers taking one NHWC `f32` tensor
//! `[1, 224, 224, 3]` and returning `[1, 5]` softmax probabilities. The
//! feature extractor takes the same input and returns channels-last
//! features, either a spatial map `[1, H, W, C]` or pooled `[1, C]`.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;
use retinagrade_core::{LoadStrategy, ModelArtifact, ModelConfig};
use anyhow::Context;
use tracing::{debug, info, warn};

use crate::error::InferenceError;
use crate::loader::ModelLoader;
use crate::network::{Classifier, FeatureExtractor};
use crate::preprocess::PreprocessedTensor;

/// Output width of EfficientNet-B0 without its top, used when the model
/// does not declare a static channel dimension.
const DEFAULT_FEATURE_CHANNELS: usize = 1280;

/// Loads artifacts and the backbone from `ModelConfig::model_dir`.
pub struct OnnxLoader {
    config: ModelConfig,
}

impl OnnxLoader {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    fn build_session(&self, path: &Path, strategy: LoadStrategy) -> anyhow::Result<Session> {
        anyhow::ensure!(path.exists(), "{} not found", path.display());

        let libraries = if strategy.registers_custom_ops() {
            self.config.custom_op_library_paths()
        } else {
            Vec::new()
        };
        for library in &libraries {
            anyhow::ensure!(
                library.exists(),
                "custom operator library {} not found",
                library.display()
            );
        }

        let level = if strategy.skips_compiled_state() {
            GraphOptimizationLevel::Disable
        } else {
            GraphOptimizationLevel::Level3
        };
        let mut builder = Session::builder()?
            .with_optimization_level(level)
            .map_err(runtime_error)?;

        if self.config.intra_threads > 0 {
            builder = builder
                .with_intra_threads(self.config.intra_threads)
                .map_err(runtime_error)?;
        }

        for library in &libraries {
            let library = library.to_string_lossy();
            debug!(library = %library, "registering custom operator library");
            builder = builder
                .with_operator_library(&*library)
                .map_err(runtime_error)
                .with_context(|| format!("registering custom operator library {library}"))?;
        }

        let session = builder
            .commit_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?;
        Ok(session)
    }
}

impl ModelLoader for OnnxLoader {
    fn load_artifact(
        &self,
        artifact: &ModelArtifact,
        strategy: LoadStrategy,
    ) -> anyhow::Result<Box<dyn Classifier>> {
        let path = self.config.artifact_path(artifact.tier);
        let session = self.build_session(&path, strategy)?;
        info!(
            artifact = artifact.identifier(),
            %strategy,
            model = %path.display(),
            "loaded classifier artifact"
        );
        Ok(Box::new(OnnxClassifier {
            session: Mutex::new(session),
        }))
    }

    fn load_feature_extractor(&self) -> anyhow::Result<Box<dyn FeatureExtractor>> {
        let path = self.config.feature_extractor_path();
        let session = self.build_session(&path, LoadStrategy::Plain)?;
        let output = session
            .outputs()
            .first()
            .context("feature extractor declares no outputs")?;
        let channels = match output.dtype() {
            ort::value::ValueType::Tensor { shape, .. } => infer_channels(shape)?,
            _ => None,
        }
        .unwrap_or(DEFAULT_FEATURE_CHANNELS);
        info!(channels, model = %path.display(), "loaded feature extractor");
        Ok(Box::new(OnnxFeatureExtractor {
            session: Mutex::new(session),
            channels,
        }))
    }
}

/// A complete classifier loaded from an artifact.
pub struct OnnxClassifier {
    // `Session::run` needs `&mut`; the lock serialises calls on one session.
    session: Mutex<Session>,
}

impl Classifier for OnnxClassifier {
    fn forward(&self, input: &PreprocessedTensor) -> Result<Vec<f32>, InferenceError> {
        let (_, probabilities) = run_single(&self.session, input)?;
        Ok(probabilities)
    }
}

/// The frozen backbone of the synthesized network.
pub struct OnnxFeatureExtractor {
    session: Mutex<Session>,
    channels: usize,
}

impl FeatureExtractor for OnnxFeatureExtractor {
    fn channels(&self) -> usize {
        self.channels
    }

    fn extract(&self, input: &PreprocessedTensor) -> Result<Vec<f32>, InferenceError> {
        let (dims, features) = run_single(&self.session, input)?;
        if dims.last().is_some_and(|&d| d > 0 && d as usize != self.channels) {
            return Err(InferenceError::FeatureShape {
                actual: features.len(),
                channels: self.channels,
            });
        }
        Ok(features)
    }
}

/// Run one input through a session, returning the first output's shape and data.
fn run_single(
    session: &Mutex<Session>,
    input: &PreprocessedTensor,
) -> Result<(Vec<i64>, Vec<f32>), InferenceError> {
    let shape = input.shape().map(|d| d as i64);
    let tensor = Tensor::from_array((shape, input.as_slice().to_vec().into_boxed_slice()))
        .map_err(inference_error)?;

    let mut session = session.lock().map_err(|_| InferenceError::Poisoned)?;
    let outputs = session
        .run(ort::inputs![tensor])
        .map_err(inference_error)?;
    if outputs.len() == 0 {
        return Err(InferenceError::Runtime("model produced no outputs".into()));
    }

    let (output_shape, output_data) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(inference_error)?;
    let dims: &[i64] = output_shape;
    Ok((dims.to_vec(), output_data.to_vec()))
}

/// Channel count from the last static dimension of the backbone output.
///
/// Outputs must be channels-last. A rank-4 shape whose last dimension is
/// smaller than its second (`[1, 1280, 7, 7]`) is a channels-first export and
/// is rejected rather than read as 7 channels.
fn infer_channels(dims: &[i64]) -> anyhow::Result<Option<usize>> {
    if let [_, second, _, last] = *dims {
        if second > 0 && last > 0 && last < second {
            warn!(shape = ?dims, "feature extractor output is channels-first");
            anyhow::bail!("feature extractor output {dims:?} is channels-first, expected [1, H, W, C]");
        }
    }
    Ok(dims
        .last()
        .and_then(|&d| if d > 0 { Some(d as usize) } else { None }))
}

fn runtime_error(e: impl std::fmt::Display) -> anyhow::Error {
    anyhow::anyhow!("{e}")
}

fn inference_error(e: impl std::fmt::Display) -> InferenceError {
    InferenceError::Runtime(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use retinagrade_core::{ARTIFACT_CHAIN, ArtifactTier, HeadConfig};

    use crate::error::ModelUnavailable;
    use crate::resolver::{ModelState, resolve_model};

    fn config_in(dir: &Path) -> ModelConfig {
        ModelConfig {
            model_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    fn write_corrupt_artifacts(config: &ModelConfig) {
        for tier in [ArtifactTier::Fresh, ArtifactTier::Compatible, ArtifactTier::Original] {
            std::fs::write(config.artifact_path(tier), b"not an onnx model").unwrap();
        }
    }

    fn unavailable(state: ModelState) -> ModelUnavailable {
        match state {
            ModelState::Unavailable(unavailable) => unavailable,
            ModelState::Ready(handle) => panic!("expected unavailable, got {handle:?}"),
        }
    }

    #[test]
    fn missing_artifact_fails_before_touching_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let loader = OnnxLoader::new(config_in(dir.path()));
        let err = match loader.load_artifact(&ARTIFACT_CHAIN[0], LoadStrategy::Plain) {
            Ok(_) => panic!("expected load failure"),
            Err(e) => e,
        };
        assert!(
            err.to_string().contains("diabetic_model_fresh.onnx not found"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn empty_model_dir_resolves_to_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let loader = OnnxLoader::new(config_in(dir.path()));
        let unavailable = unavailable(resolve_model(&loader, &HeadConfig::default()));

        assert_eq!(unavailable.attempts.len(), 6);
        assert!(unavailable.synthesis.contains("efficientnet_b0_notop.onnx not found"));
    }

    #[test]
    fn corrupt_artifacts_record_runtime_errors_for_every_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        write_corrupt_artifacts(&config);

        let loader = OnnxLoader::new(config);
        let unavailable = unavailable(resolve_model(&loader, &HeadConfig::default()));

        assert_eq!(unavailable.attempts.len(), 6);
        for attempt in &unavailable.attempts {
            assert!(!attempt.message.is_empty());
            assert!(
                !attempt.message.contains("not found"),
                "{}/{}: {}",
                attempt.tier,
                attempt.strategy,
                attempt.message
            );
        }
    }

    #[test]
    fn custom_op_libraries_only_apply_to_strategies_that_register_them() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.custom_op_libraries = vec!["missing_ops.so".into()];
        write_corrupt_artifacts(&config);

        let loader = OnnxLoader::new(config);
        let unavailable = unavailable(resolve_model(&loader, &HeadConfig::default()));

        assert_eq!(unavailable.attempts.len(), 6);
        for attempt in &unavailable.attempts {
            let library_failure = attempt.message.contains("custom operator library");
            assert_eq!(
                library_failure,
                attempt.strategy.registers_custom_ops(),
                "{}/{}: {}",
                attempt.tier,
                attempt.strategy,
                attempt.message
            );
        }
        let skipped: Vec<LoadStrategy> = unavailable
            .attempts
            .iter()
            .filter(|a| !a.message.contains("custom operator library"))
            .map(|a| a.strategy)
            .collect();
        assert_eq!(
            skipped,
            vec![LoadStrategy::EmptyCustomOpRegistry, LoadStrategy::Bare]
        );
    }

    #[test]
    fn channels_read_from_channels_last_output() {
        assert_eq!(infer_channels(&[1, 7, 7, 1280]).unwrap(), Some(1280));
        assert_eq!(infer_channels(&[1, 1280]).unwrap(), Some(1280));
        assert_eq!(infer_channels(&[-1, -1, -1, 1280]).unwrap(), Some(1280));
        assert_eq!(infer_channels(&[1, 7, 7, -1]).unwrap(), None);
    }

    #[test]
    fn channels_first_output_is_rejected() {
        let err = infer_channels(&[1, 1280, 7, 7]).unwrap_err();
        assert!(err.to_string().contains("channels-first"), "{err}");
    }
}
