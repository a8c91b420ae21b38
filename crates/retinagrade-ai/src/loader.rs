use retinagrade_core::{LoadStrategy, ModelArtifact};

use crate::network::{Classifier, FeatureExtractor};

/// Boundary between the resolver and a numeric runtime.
///
/// Implementations own the on-disk format; the resolver only sees success
/// or an error to log before moving on.
pub trait ModelLoader {
    /// Load a complete classifier from `artifact` using `strategy`.
    fn load_artifact(
        &self,
        artifact: &ModelArtifact,
        strategy: LoadStrategy,
    ) -> anyhow::Result<Box<dyn Classifier>>;

    /// Load the pretrained, frozen backbone for the synthesized fallback.
    fn load_feature_extractor(&self) -> anyhow::Result<Box<dyn FeatureExtractor>>;
}
