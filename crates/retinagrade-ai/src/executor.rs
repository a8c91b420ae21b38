//! Single-image inference and output decoding.

use retinagrade_core::{NUM_GRADES, PredictionResult, label_for};
use tracing::{debug, info};

use crate::error::{InferenceError, PredictError};
use crate::preprocess::{PreprocessedTensor, synthetic_tensor};
use crate::resolver::ModelState;

/// Run one forward pass and decode it.
///
/// Fails fast with [`PredictError::ModelUnavailable`] when resolution found
/// no model; the network is never invoked in that case.
pub fn predict(
    state: &ModelState,
    tensor: &PreprocessedTensor,
) -> Result<PredictionResult, PredictError> {
    let handle = state.handle().ok_or(PredictError::ModelUnavailable)?;
    let probabilities = handle.network().forward(tensor)?;
    let result = decode(probabilities)?;
    debug!(
        class = result.class_index,
        confidence = result.confidence,
        provenance = %handle.provenance(),
        "prediction"
    );
    Ok(result)
}

/// Seed of the random image used by [`self_check`].
const SELF_CHECK_SEED: u64 = 224;

/// Run one prediction on a random 224×224 image.
///
/// A model that loads but cannot run inference fails here with
/// [`PredictError::Inference`] instead of at the first real request.
pub fn self_check(state: &ModelState) -> Result<PredictionResult, PredictError> {
    let result = predict(state, &synthetic_tensor(SELF_CHECK_SEED))?;
    info!(
        class = result.class_index,
        label = %result.label,
        confidence = result.confidence,
        "model self-check passed"
    );
    Ok(result)
}

/// Turn a probability vector into a [`PredictionResult`].
///
/// The class is the index of the largest probability; on ties the lowest
/// index wins.
pub fn decode(probabilities: Vec<f32>) -> Result<PredictionResult, InferenceError> {
    if probabilities.len() != NUM_GRADES {
        return Err(InferenceError::OutputShape {
            expected: NUM_GRADES,
            actual: probabilities.len(),
        });
    }
    if let Some(i) = probabilities.iter().position(|p| !p.is_finite()) {
        return Err(InferenceError::NonFinite(i));
    }

    let mut class_index = 0;
    let mut confidence = probabilities[0];
    for (i, &p) in probabilities.iter().enumerate().skip(1) {
        if p > confidence {
            class_index = i;
            confidence = p;
        }
    }

    Ok(PredictionResult {
        class_index,
        label: label_for(class_index).to_string(),
        confidence,
        probabilities,
    })
}
