use retinagrade_core::{ArtifactTier, LoadStrategy};
use thiserror::Error;

/// One failed attempt inside the resolution chain. Logged and recorded,
/// never returned to callers on its own.
#[derive(Debug, Clone, Error)]
#[error("{tier}/{strategy}: {message}")]
pub struct ArtifactLoadError {
    pub tier: ArtifactTier,
    pub strategy: LoadStrategy,
    pub message: String,
}

/// Resolution exhausted every artifact strategy and could not synthesize a
/// fallback network either.
#[derive(Debug, Clone, Error)]
#[error("model not available: {} artifact attempts failed, synthesis failed: {synthesis}", .attempts.len())]
pub struct ModelUnavailable {
    /// Every failed artifact attempt, in the order they were tried.
    pub attempts: Vec<ArtifactLoadError>,
    pub synthesis: String,
}

#[derive(Debug, Error)]
pub enum PreprocessingError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("expected {expected} class probabilities, model produced {actual}")]
    OutputShape { expected: usize, actual: usize },

    #[error("model produced a non-finite probability at index {0}")]
    NonFinite(usize),

    #[error("feature extractor produced {actual} values, not a multiple of {channels} channels")]
    FeatureShape { actual: usize, channels: usize },

    #[error("session lock poisoned by a previous panic")]
    Poisoned,
}

/// Failure of a single `predict` call.
#[derive(Debug, Error)]
pub enum PredictError {
    /// No model was resolved at startup. The message is stable so callers
    /// can show it directly.
    #[error("model not available")]
    ModelUnavailable,

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_load_error_names_attempt() {
        let err = ArtifactLoadError {
            tier: ArtifactTier::Original,
            strategy: LoadStrategy::Bare,
            message: "unsupported opset 7".into(),
        };
        assert_eq!(err.to_string(), "original/bare: unsupported opset 7");
    }

    #[test]
    fn model_unavailable_message_is_stable() {
        assert_eq!(PredictError::ModelUnavailable.to_string(), "model not available");
    }

    #[test]
    fn unavailable_summarises_attempts() {
        let err = ModelUnavailable {
            attempts: vec![
                ArtifactLoadError {
                    tier: ArtifactTier::Fresh,
                    strategy: LoadStrategy::Plain,
                    message: "missing".into(),
                },
                ArtifactLoadError {
                    tier: ArtifactTier::Compatible,
                    strategy: LoadStrategy::Plain,
                    message: "missing".into(),
                },
            ],
            synthesis: "backbone not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "model not available: 2 artifact attempts failed, synthesis failed: backbone not found"
        );
    }
}
