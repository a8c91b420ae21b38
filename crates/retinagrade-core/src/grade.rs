//! Diabetic-retinopathy severity grades.
//!
//! The classifier head emits one probability per grade in the order of
//! [`SEVERITY_LABELS`]. This list is the only place that ordering is defined:
//! the synthesized head sizes its output layer from [`NUM_GRADES`] and the
//! executor decodes class indices through [`label_for`].

/// Number of severity grades the classifier distinguishes.
pub const NUM_GRADES: usize = 5;

/// Human-readable grade names, indexed by class index.
pub const SEVERITY_LABELS: [&str; NUM_GRADES] = [
    "No Diabetic Retinopathy",
    "Mild Diabetic Retinopathy",
    "Moderate Diabetic Retinopathy",
    "Severe Diabetic Retinopathy",
    "Proliferative Diabetic Retinopathy",
];

/// Label returned for any index outside `0..NUM_GRADES`.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Look up the label for a class index.
///
/// Total over all integer types: negative or out-of-range indices return
/// [`UNKNOWN_LABEL`] instead of failing.
pub fn label_for<I: TryInto<usize>>(index: I) -> &'static str {
    index
        .try_into()
        .ok()
        .and_then(|i| SEVERITY_LABELS.get(i))
        .copied()
        .unwrap_or(UNKNOWN_LABEL)
}
