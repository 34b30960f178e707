use base64::{engine::general_purpose::STANDARD, Engine};
use burn::tensor::{backend::Backend, Shape, Tensor, TensorData};
use image::{
    imageops::{self, FilterType},
    DynamicImage,
};

use crate::error::ImageProcessingError;

/// Edge length of the square images the classifier consumes.
pub const IMAGE_SIZE: usize = 28;

/// Decodes a base64 image and normalizes it into a `[1, 1, 28, 28]` tensor with values in `[0, 1]`.
pub fn normalize<B: Backend>(
    encoded: &str,
    device: &B::Device,
) -> Result<Tensor<B, 4>, ImageProcessingError> {
    normalize_with_size(encoded, IMAGE_SIZE, device)
}

/// Same as [normalize], resizing to `size` x `size` instead.
///
/// # Shapes
///
/// - output: `[1, 1, size, size]`
pub fn normalize_with_size<B: Backend>(
    encoded: &str,
    size: usize,
    device: &B::Device,
) -> Result<Tensor<B, 4>, ImageProcessingError> {
    let bytes = decode_base64(encoded)?;
    let pixels = luma_pixels(&bytes, size)?;

    let data = TensorData::new(pixels, Shape::new([1, 1, size, size]));
    Ok(Tensor::from_data(data.convert::<B::FloatElem>(), device))
}

/// Decodes the base64 payload of an image.
///
/// Whitespace is ignored and a `data:<mime>;base64,` URL prefix is stripped.
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, ImageProcessingError> {
    let payload = encoded.trim();
    let payload = match payload.strip_prefix("data:") {
        Some(url) => url.split_once(',').map_or(url, |(_, data)| data),
        None => payload,
    };
    let payload: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    Ok(STANDARD.decode(payload)?)
}

/// Parses image bytes, converts them to grayscale and resizes to `size` x `size`.
///
/// Returns the pixels in row major order, scaled to `[0, 1]`.
pub fn luma_pixels(bytes: &[u8], size: usize) -> Result<Vec<f32>, ImageProcessingError> {
    let image = image::load_from_memory(bytes)?;
    resize_luma(&image, size)
}

/// Converts a decoded image to grayscale and resizes it to `size` x `size`.
pub fn resize_luma(image: &DynamicImage, size: usize) -> Result<Vec<f32>, ImageProcessingError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(ImageProcessingError::EmptyImage { width, height });
    }
    log::debug!(
        "Decoded {width}x{height} {:?} image, resizing to {size}x{size}",
        image.color()
    );

    let gray = image.to_luma8();
    let resized = imageops::resize(&gray, size as u32, size as u32, FilterType::Triangle);

    Ok(resized
        .into_raw()
        .into_iter()
        .map(|pixel| pixel as f32 / 255.0)
        .collect())
}
