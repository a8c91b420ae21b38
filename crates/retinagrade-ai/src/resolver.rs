//! Startup model resolution.
//!
//! Deployments may ship artifacts saved by incompatible runtime versions.
//! [`resolve_model`] tries every artifact/strategy pair of
//! [`ARTIFACT_CHAIN`] in order, stops at the first that loads, and otherwise
//! synthesizes a network from the pretrained backbone with an untrained head.
//! Only when that also fails does it return [`ModelState::Unavailable`].

use retinagrade_core::{ARTIFACT_CHAIN, ArtifactTier, HeadConfig, LoadStrategy, Provenance};
use tracing::{error, info, warn};

use crate::error::{ArtifactLoadError, ModelUnavailable};
use crate::head::SynthesizedNetwork;
use crate::loader::ModelLoader;
use crate::network::Classifier;
use crate::preprocess::{INPUT_CHANNELS, INPUT_SIZE};

/// The resolved network plus where it came from.
pub struct ModelHandle {
    network: Box<dyn Classifier>,
    provenance: Provenance,
}

impl ModelHandle {
    pub fn new(network: Box<dyn Classifier>, provenance: Provenance) -> Self {
        Self {
            network,
            provenance,
        }
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// `(height, width, channels)` of a single input image.
    pub fn input_shape(&self) -> (usize, usize, usize) {
        (INPUT_SIZE as usize, INPUT_SIZE as usize, INPUT_CHANNELS)
    }

    pub(crate) fn network(&self) -> &dyn Classifier {
        self.network.as_ref()
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("provenance", &self.provenance)
            .finish_non_exhaustive()
    }
}

/// Outcome of startup resolution.
#[derive(Debug)]
pub enum ModelState {
    Ready(ModelHandle),
    Unavailable(ModelUnavailable),
}

impl ModelState {
    pub fn handle(&self) -> Option<&ModelHandle> {
        match self {
            Self::Ready(handle) => Some(handle),
            Self::Unavailable(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn provenance(&self) -> Option<Provenance> {
        self.handle().map(ModelHandle::provenance)
    }
}

type Attempt<'a> = Box<dyn FnOnce() -> anyhow::Result<Box<dyn Classifier>> + 'a>;

struct Strategy<'a> {
    tier: ArtifactTier,
    strategy: LoadStrategy,
    attempt: Attempt<'a>,
}

/// One closure per artifact/strategy pair, in chain order.
fn artifact_strategies(loader: &dyn ModelLoader) -> Vec<Strategy<'_>> {
    ARTIFACT_CHAIN
        .iter()
        .flat_map(move |artifact| {
            artifact.strategies.iter().map(move |&strategy| Strategy {
                tier: artifact.tier,
                strategy,
                attempt: Box::new(move || loader.load_artifact(artifact, strategy)),
            })
        })
        .collect()
}

/// Resolve the process-wide model. Never fails: exhaustion is reported as
/// [`ModelState::Unavailable`].
pub fn resolve_model(loader: &dyn ModelLoader, head: &HeadConfig) -> ModelState {
    let mut failures = Vec::new();

    for Strategy {
        tier,
        strategy,
        attempt,
    } in artifact_strategies(loader)
    {
        match attempt() {
            Ok(network) => {
                let provenance = Provenance::Artifact { tier, strategy };
                info!(%provenance, attempts = failures.len() + 1, "model resolved");
                return ModelState::Ready(ModelHandle::new(network, provenance));
            }
            Err(e) => {
                let message = format!("{e:#}");
                warn!(artifact = %tier, %strategy, error = %message, "model load attempt failed");
                failures.push(ArtifactLoadError {
                    tier,
                    strategy,
                    message,
                });
            }
        }
    }

    match loader.load_feature_extractor() {
        Ok(backbone) => {
            let network = SynthesizedNetwork::new(backbone, head.seed);
            warn!(
                failed_attempts = failures.len(),
                "all artifacts failed; serving synthesized network with untrained head"
            );
            ModelState::Ready(ModelHandle::new(Box::new(network), Provenance::Synthesized))
        }
        Err(e) => {
            let synthesis = format!("{e:#}");
            error!(
                failed_attempts = failures.len(),
                error = %synthesis,
                "could not synthesize fallback network; model unavailable"
            );
            ModelState::Unavailable(ModelUnavailable {
                attempts: failures,
                synthesis,
            })
        }
    }
}
