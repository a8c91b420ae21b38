//! Fallback network: frozen backbone plus a freshly initialised head.
//!
//! Architecture after the backbone:
//! global average pooling → dropout 0.3 → dense 128 (ReLU) → dropout 0.2 →
//! dense 5 (softmax). Dense weights are Glorot-uniform, biases zero. Dropout
//! is the identity at inference, so it only appears here to keep the layer
//! sequence identical to the trained artifacts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use retinagrade_core::NUM_GRADES;

use crate::error::InferenceError;
use crate::network::{Classifier, FeatureExtractor, global_average_pool};
use crate::preprocess::PreprocessedTensor;

/// Width of the hidden dense layer.
pub const HIDDEN_UNITS: usize = 128;

const DROPOUT_AFTER_POOL: f32 = 0.3;
const DROPOUT_AFTER_HIDDEN: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Relu,
    Softmax,
}

/// Fully connected layer, weights stored row-major as `[inputs][outputs]`.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    inputs: usize,
    outputs: usize,
    weights: Vec<f32>,
    bias: Vec<f32>,
    activation: Activation,
}

impl DenseLayer {
    /// Glorot-uniform weights, zero bias.
    pub fn glorot_uniform(
        inputs: usize,
        outputs: usize,
        activation: Activation,
        rng: &mut impl Rng,
    ) -> Self {
        let limit = (6.0 / (inputs + outputs) as f32).sqrt();
        let weights = (0..inputs * outputs)
            .map(|_| rng.gen_range(-limit..limit))
            .collect();
        Self {
            inputs,
            outputs,
            weights,
            bias: vec![0.0; outputs],
            activation,
        }
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        debug_assert_eq!(input.len(), self.inputs);
        let mut out = self.bias.clone();
        for (x, row) in input.iter().zip(self.weights.chunks_exact(self.outputs)) {
            for (o, &w) in out.iter_mut().zip(row) {
                *o += x * w;
            }
        }
        match self.activation {
            Activation::Relu => {
                for v in &mut out {
                    *v = v.max(0.0);
                }
            }
            Activation::Softmax => softmax(&mut out),
        }
        out
    }
}

/// Numerically stable softmax in place.
pub fn softmax(values: &mut [f32]) {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0f32;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in values.iter_mut() {
            *v /= sum;
        }
    }
}

#[derive(Debug, Clone)]
enum HeadLayer {
    Dropout(f32),
    Dense(DenseLayer),
}

/// Trainable part of the fallback network, applied to pooled features.
#[derive(Debug, Clone)]
pub struct ClassificationHead {
    layers: Vec<HeadLayer>,
}

impl ClassificationHead {
    /// Build a randomly initialised head for a backbone of `feature_channels`.
    ///
    /// With a seed the weights are reproducible; without one they come from
    /// OS entropy.
    pub fn random(feature_channels: usize, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            layers: vec![
                HeadLayer::Dropout(DROPOUT_AFTER_POOL),
                HeadLayer::Dense(DenseLayer::glorot_uniform(
                    feature_channels,
                    HIDDEN_UNITS,
                    Activation::Relu,
                    &mut rng,
                )),
                HeadLayer::Dropout(DROPOUT_AFTER_HIDDEN),
                HeadLayer::Dense(DenseLayer::glorot_uniform(
                    HIDDEN_UNITS,
                    NUM_GRADES,
                    Activation::Softmax,
                    &mut rng,
                )),
            ],
        }
    }

    pub fn input_width(&self) -> usize {
        self.layers
            .iter()
            .find_map(|layer| match layer {
                HeadLayer::Dense(dense) => Some(dense.inputs()),
                HeadLayer::Dropout(_) => None,
            })
            .unwrap_or(0)
    }

    /// Dropout rates in layer order. Inactive at inference.
    pub fn dropout_rates(&self) -> Vec<f32> {
        self.layers
            .iter()
            .filter_map(|layer| match layer {
                HeadLayer::Dropout(rate) => Some(*rate),
                HeadLayer::Dense(_) => None,
            })
            .collect()
    }

    pub fn forward(&self, pooled: &[f32]) -> Vec<f32> {
        let mut x = pooled.to_vec();
        for layer in &self.layers {
            if let HeadLayer::Dense(dense) = layer {
                x = dense.forward(&x);
            }
        }
        x
    }
}

/// Frozen backbone → pooling → [`ClassificationHead`].
pub struct SynthesizedNetwork {
    backbone: Box<dyn FeatureExtractor>,
    head: ClassificationHead,
}

impl SynthesizedNetwork {
    pub fn new(backbone: Box<dyn FeatureExtractor>, seed: Option<u64>) -> Self {
        let head = ClassificationHead::random(backbone.channels(), seed);
        Self { backbone, head }
    }
}

impl Classifier for SynthesizedNetwork {
    fn forward(&self, input: &PreprocessedTensor) -> Result<Vec<f32>, InferenceError> {
        let features = self.backbone.extract(input)?;
        let pooled = global_average_pool(&features, self.head.input_width())?;
        Ok(self.head.forward(&pooled))
    }
}
