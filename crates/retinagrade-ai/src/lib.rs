//! Model resolution and inference: image preprocessing, the startup fallback
//! chain, and single-image prediction. ONNX Runtime backend behind `onnx`.

mod error;
mod executor;
pub mod head;
mod loader;
pub mod network;
pub mod preprocess;
mod resolver;
mod state;

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use onnx::{OnnxClassifier, OnnxFeatureExtractor, OnnxLoader};

pub use error::{ArtifactLoadError, InferenceError, ModelUnavailable, PredictError, PreprocessingError};
pub use executor::{decode, predict, self_check};
pub use loader::ModelLoader;
pub use network::{Classifier, FeatureExtractor};
pub use preprocess::{PreprocessedTensor, decode_image, open_image, preprocess};
pub use resolver::{ModelHandle, ModelState, resolve_model};
pub use state::{install_model, installed_model};
