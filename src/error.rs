/// Failure to turn an encoded payload into a normalized image tensor.
#[derive(thiserror::Error, Debug)]
pub enum ImageProcessingError {
    #[error("image processing failed: invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("image processing failed: source image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

/// The classifier produced scores the decoder cannot interpret.
///
/// This is never caused by user input; it means the classifier and the alphabet disagree.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("score vector has {actual} entries, expected {expected}")]
    Length { expected: usize, actual: usize },

    #[error("score tensor must hold a single item, got a batch of {0}")]
    Batch(usize),

    #[error("score tensor could not be read: {0}")]
    Data(String),
}

/// Error returned by the recognition entry points.
///
/// Display and source are forwarded to the wrapped error.
#[derive(thiserror::Error, Debug)]
pub enum RecognitionError {
    #[error(transparent)]
    ImageProcessing(#[from] ImageProcessingError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
