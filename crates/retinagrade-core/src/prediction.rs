use serde::{Deserialize, Serialize};

/// Outcome of classifying one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub class_index: usize,
    pub label: String,
    /// Maximum entry of `probabilities`.
    pub confidence: f32,
    /// One probability per grade, in label order.
    pub probabilities: Vec<f32>,
}

impl PredictionResult {
    /// Confidence as a percentage, for display.
    pub fn confidence_percent(&self) -> f32 {
        self.confidence * 100.0
    }
}
