//! Runtime-agnostic network seams.
//!
//! A resolved model is anything that maps one [`PreprocessedTensor`] to a
//! probability per grade. Loaded artifacts implement [`Classifier`] directly;
//! the synthesized fallback composes a [`FeatureExtractor`] with a head built
//! in [`crate::head`].

use crate::error::InferenceError;
use crate::preprocess::PreprocessedTensor;

/// A complete classifier: image tensor in, class probabilities out.
pub trait Classifier: Send + Sync {
    fn forward(&self, input: &PreprocessedTensor) -> Result<Vec<f32>, InferenceError>;
}

/// A frozen convolutional backbone.
pub trait FeatureExtractor: Send + Sync {
    /// Width of the feature vector at each spatial position.
    fn channels(&self) -> usize;

    /// Run the backbone. Returns channels-last features, either a full
    /// spatial map (`positions × channels`) or an already pooled vector.
    fn extract(&self, input: &PreprocessedTensor) -> Result<Vec<f32>, InferenceError>;
}

/// Average a channels-last feature map over its spatial positions.
pub fn global_average_pool(features: &[f32], channels: usize) -> Result<Vec<f32>, InferenceError> {
    if channels == 0 || features.is_empty() || features.len() % channels != 0 {
        return Err(InferenceError::FeatureShape {
            actual: features.len(),
            channels,
        });
    }

    let positions = features.len() / channels;
    let mut pooled = vec![0.0f32; channels];
    for position in features.chunks_exact(channels) {
        for (acc, &v) in pooled.iter_mut().zip(position) {
            *acc += v;
        }
    }
    for v in &mut pooled {
        *v /= positions as f32;
    }
    Ok(pooled)
}
