//! Image → network input tensor.
//!
//! Every image goes through the same four steps: force 3-channel RGB, resize
//! to 224×224, normalise each channel with the feature extractor's ImageNet
//! statistics, and prepend a batch dimension. The backbone was trained on
//! exactly this encoding; feeding it anything else yields confident but
//! meaningless predictions, so [`normalize_channel`] is the only place the
//! statistics are applied.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageReader, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::PreprocessingError;

/// Side length of the square network input.
pub const INPUT_SIZE: u32 = 224;

/// Colour channels of the network input.
pub const INPUT_CHANNELS: usize = 3;

/// NHWC shape of one preprocessed image.
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, INPUT_CHANNELS];

/// ImageNet per-channel mean (RGB), applied after scaling to `[0, 1]`.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet per-channel standard deviation (RGB).
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

const INPUT_LEN: usize = INPUT_SHAPE[0] * INPUT_SHAPE[1] * INPUT_SHAPE[2] * INPUT_SHAPE[3];

/// One normalised image, NHWC, batch size 1.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedTensor {
    data: Box<[f32]>,
}

impl PreprocessedTensor {
    pub fn shape(&self) -> [usize; 4] {
        INPUT_SHAPE
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Normalise one 8-bit channel value with the feature extractor's statistics.
#[inline]
pub fn normalize_channel(value: u8, channel: usize) -> f32 {
    (value as f32 / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]
}

/// Convert a decoded image into the classifier's input tensor.
pub fn preprocess(image: &DynamicImage) -> Result<PreprocessedTensor, PreprocessingError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(PreprocessingError::EmptyImage { width, height });
    }

    let rgb = image.to_rgb8();
    // Resize unconditionally so a 224×224 input takes the same path as any other.
    let resized: RgbImage = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let mut data = Vec::with_capacity(INPUT_LEN);
    for pixel in resized.pixels() {
        for (c, &value) in pixel.0.iter().enumerate() {
            data.push(normalize_channel(value, c));
        }
    }
    debug_assert_eq!(data.len(), INPUT_LEN);

    debug!(width, height, color = ?image.color(), "preprocessed image");
    Ok(PreprocessedTensor {
        data: data.into_boxed_slice(),
    })
}

/// Tensor of a uniformly random 224×224 RGB image, normalised like any other
/// input. Used to check that a resolved model can actually run inference.
pub fn synthetic_tensor(seed: u64) -> PreprocessedTensor {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Box<[f32]> = (0..INPUT_LEN)
        .map(|i| normalize_channel(rng.r#gen::<u8>(), i % INPUT_CHANNELS))
        .collect();
    PreprocessedTensor { data }
}

/// Decode an encoded image (PNG, JPEG, GIF, ...) from memory.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, PreprocessingError> {
    Ok(image::load_from_memory(bytes)?)
}

/// Open and decode an image file, guessing the format from its contents.
pub fn open_image(path: &Path) -> Result<DynamicImage, PreprocessingError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(image)
}
