//! Text and JSON rendering for CLI output.

use retinagrade_ai::{ModelState, ModelUnavailable, PredictError};
use retinagrade_core::{PredictionResult, Provenance, SEVERITY_LABELS};
use serde::Serialize;

#[derive(Serialize)]
pub struct ClassifyReport<'a> {
    pub image: String,
    pub provenance: Provenance,
    #[serde(flatten)]
    pub prediction: &'a PredictionResult,
}

#[derive(Serialize)]
struct AttemptReport {
    artifact: String,
    strategy: String,
    error: String,
}

/// Outcome of the post-resolution self-check, when one ran.
pub type SelfCheck = Result<PredictionResult, PredictError>;

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum SelfCheckReport {
    Passed {
        class_index: usize,
        label: String,
        confidence: f32,
    },
    Failed {
        error: String,
    },
}

impl SelfCheckReport {
    fn from_check(check: &SelfCheck) -> Self {
        match check {
            Ok(p) => Self::Passed {
                class_index: p.class_index,
                label: p.label.clone(),
                confidence: p.confidence,
            },
            Err(e) => Self::Failed {
                error: e.to_string(),
            },
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ResolveReport {
    Ready {
        provenance: Provenance,
        #[serde(skip_serializing_if = "Option::is_none")]
        self_check: Option<SelfCheckReport>,
    },
    Unavailable {
        failed_attempts: Vec<AttemptReport>,
        synthesis_error: String,
    },
}

impl ResolveReport {
    fn from_state(state: &ModelState, check: Option<&SelfCheck>) -> Self {
        match state {
            ModelState::Ready(handle) => Self::Ready {
                provenance: handle.provenance(),
                self_check: check.map(SelfCheckReport::from_check),
            },
            ModelState::Unavailable(unavailable) => Self::Unavailable {
                failed_attempts: attempt_reports(unavailable),
                synthesis_error: unavailable.synthesis.clone(),
            },
        }
    }
}

fn attempt_reports(unavailable: &ModelUnavailable) -> Vec<AttemptReport> {
    unavailable
        .attempts
        .iter()
        .map(|a| AttemptReport {
            artifact: a.tier.to_string(),
            strategy: a.strategy.to_string(),
            error: a.message.clone(),
        })
        .collect()
}

pub fn prediction_text(report: &ClassifyReport<'_>) -> String {
    let p = report.prediction;
    let mut out = String::new();
    out.push_str(&format!("Image:      {}\n", report.image));
    out.push_str(&format!("Prediction: {} (class {})\n", p.label, p.class_index));
    out.push_str(&format!("Confidence: {:.2}%\n", p.confidence_percent()));
    out.push_str(&format!("Model:      {}\n", report.provenance));
    if report.provenance.is_synthesized() {
        out.push_str("Warning:    classification head is untrained; result is not meaningful\n");
    }
    out.push_str("\nProbabilities:\n");
    for (i, prob) in p.probabilities.iter().enumerate() {
        let name = SEVERITY_LABELS.get(i).copied().unwrap_or("?");
        out.push_str(&format!("  {i}  {name:<36} {:>6.2}%\n", prob * 100.0));
    }
    out
}

pub fn prediction_json(report: &ClassifyReport<'_>) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn resolution_text(state: &ModelState, check: Option<&SelfCheck>) -> String {
    match state {
        ModelState::Ready(handle) => {
            let provenance = handle.provenance();
            let mut out = format!("Model ready: {provenance}\n");
            if provenance.is_synthesized() {
                out.push_str("Warning: no trained artifact loaded; head weights are random\n");
            }
            match check {
                Some(Ok(p)) => out.push_str(&format!(
                    "Self-check: {} (class {}), confidence {:.2}%\n",
                    p.label,
                    p.class_index,
                    p.confidence_percent()
                )),
                Some(Err(e)) => out.push_str(&format!("Self-check failed: {e}\n")),
                None => {}
            }
            out
        }
        ModelState::Unavailable(unavailable) => {
            let mut out = String::from("Model not available\n");
            for (i, a) in unavailable.attempts.iter().enumerate() {
                out.push_str(&format!(
                    "  {}. {}/{}: {}\n",
                    i + 1,
                    a.tier,
                    a.strategy,
                    a.message
                ));
            }
            out.push_str(&format!("  synthesis: {}\n", unavailable.synthesis));
            out
        }
    }
}

pub fn resolution_json(state: &ModelState, check: Option<&SelfCheck>) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&ResolveReport::from_state(state, check))?)
}

pub fn labels_text() -> String {
    SEVERITY_LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| format!("{i}  {label}\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use retinagrade_ai::{ArtifactLoadError, InferenceError, ModelHandle};
    use retinagrade_core::{ArtifactTier, LoadStrategy};

    fn prediction() -> PredictionResult {
        PredictionResult {
            class_index: 3,
            label: "Severe Diabetic Retinopathy".into(),
            confidence: 0.62,
            probabilities: vec![0.05, 0.08, 0.15, 0.62, 0.10],
        }
    }

    fn unavailable() -> ModelState {
        ModelState::Unavailable(ModelUnavailable {
            attempts: vec![ArtifactLoadError {
                tier: ArtifactTier::Fresh,
                strategy: LoadStrategy::Plain,
                message: "models/diabetic_model_fresh.onnx not found".into(),
            }],
            synthesis: "models/efficientnet_b0_notop.onnx not found".into(),
        })
    }

    #[test]
    fn text_report_shows_label_and_confidence() {
        let prediction = prediction();
        let report = ClassifyReport {
            image: "eye.png".into(),
            provenance: Provenance::Artifact {
                tier: ArtifactTier::Original,
                strategy: LoadStrategy::Bare,
            },
            prediction: &prediction,
        };
        let text = prediction_text(&report);
        assert!(text.contains("Prediction: Severe Diabetic Retinopathy (class 3)"));
        assert!(text.contains("Confidence: 62.00%"));
        assert!(text.contains("Model:      original/bare"));
        assert!(!text.contains("untrained"));
    }

    #[test]
    fn text_report_warns_on_synthesized_model() {
        let prediction = prediction();
        let report = ClassifyReport {
            image: "eye.png".into(),
            provenance: Provenance::Synthesized,
            prediction: &prediction,
        };
        assert!(prediction_text(&report).contains("untrained"));
    }

    #[test]
    fn json_report_flattens_prediction() {
        let prediction = prediction();
        let report = ClassifyReport {
            image: "eye.png".into(),
            provenance: Provenance::Synthesized,
            prediction: &prediction,
        };
        let value: serde_json::Value =
            serde_json::from_str(&prediction_json(&report).unwrap()).unwrap();
        assert_eq!(value["class_index"], 3);
        assert_eq!(value["label"], "Severe Diabetic Retinopathy");
        assert_eq!(value["provenance"]["source"], "synthesized");
        assert_eq!(value["probabilities"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn unavailable_resolution_lists_attempts() {
        let state = unavailable();
        let text = resolution_text(&state, None);
        assert!(text.starts_with("Model not available"));
        assert!(text.contains("1. fresh/plain: models/diabetic_model_fresh.onnx not found"));
        assert!(text.contains("synthesis: models/efficientnet_b0_notop.onnx not found"));

        let value: serde_json::Value =
            serde_json::from_str(&resolution_json(&state, None).unwrap()).unwrap();
        assert_eq!(value["status"], "unavailable");
        assert_eq!(value["failed_attempts"][0]["artifact"], "fresh");
        assert_eq!(value["failed_attempts"][0]["strategy"], "plain");
    }

    #[test]
    fn labels_listed_in_class_order() {
        let text = labels_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "0  No Diabetic Retinopathy");
        assert_eq!(lines[4], "4  Proliferative Diabetic Retinopathy");
    }

    #[test]
    fn ready_resolution_reports_self_check() {
        let state = ModelState::Ready(ModelHandle::new(
            Box::new(Uniform),
            Provenance::Artifact {
                tier: ArtifactTier::Compatible,
                strategy: LoadStrategy::Plain,
            },
        ));

        let passed: SelfCheck = Ok(prediction());
        let text = resolution_text(&state, Some(&passed));
        assert!(text.starts_with("Model ready: compatible/plain"));
        assert!(text.contains("Self-check: Severe Diabetic Retinopathy (class 3), confidence 62.00%"));

        let value: serde_json::Value =
            serde_json::from_str(&resolution_json(&state, Some(&passed)).unwrap()).unwrap();
        assert_eq!(value["status"], "ready");
        assert_eq!(value["self_check"]["status"], "passed");
        assert_eq!(value["self_check"]["class_index"], 3);

        let failed: SelfCheck = Err(PredictError::Inference(InferenceError::NonFinite(2)));
        assert!(resolution_text(&state, Some(&failed)).contains("Self-check failed"));
        let value: serde_json::Value =
            serde_json::from_str(&resolution_json(&state, Some(&failed)).unwrap()).unwrap();
        assert_eq!(value["self_check"]["status"], "failed");
    }

    struct Uniform;

    impl retinagrade_ai::Classifier for Uniform {
        fn forward(
            &self,
            _input: &retinagrade_ai::PreprocessedTensor,
        ) -> Result<Vec<f32>, InferenceError> {
            Ok(vec![0.2; 5])
        }
    }
}
