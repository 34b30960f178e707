//! # Handwriting Recognition
//!
//! Recognizes a single handwritten character in an image. The pipeline has three stages:
//!
//! - `normalizer`: base64 image to a `[1, 1, 28, 28]` grayscale tensor in `[0, 1]`
//! - `model`: convolutional classifier producing one raw score per class
//! - `decoder`: best scoring class to a character of `0-9`, `A-Z`, `a-z`
//!
//! The classifier parameters are randomly initialized, no trained weights are shipped, so the
//! recognized character carries no meaning yet.

pub mod decoder;
pub mod error;
pub mod inference;
pub mod model;
pub mod normalizer;

pub use error::*;
pub use inference::*;

/// Backend used by [recognize].
#[cfg(feature = "ndarray")]
pub type DefaultBackend = burn::backend::NdArray<f32>;

/// Recognizes the character drawn in a base64 encoded image.
///
/// A fresh classifier is built for every call on the CPU backend. Use [RecognizerConfig] to reuse
/// the classifier across calls or to pick another backend.
#[cfg(feature = "ndarray")]
pub fn recognize(encoded: &str) -> Result<char, RecognitionError> {
    RecognizerConfig::new()
        .init::<DefaultBackend>(&Default::default())
        .recognize(encoded)
}

#[cfg(test)]
pub type TestBackend = burn::backend::NdArray<f32>;
