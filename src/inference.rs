use burn::{config::Config, tensor::backend::Backend};

use crate::decoder;
use crate::error::RecognitionError;
use crate::model::{Classifier, ClassifierConfig};
use crate::normalizer::normalize_with_size;

/// When the classifier parameters are created.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum ParameterLifecycle {
    /// Build a new classifier for every call.
    PerCall,
    /// Build one classifier up front and reuse it, read only, for every call.
    Shared,
}

#[derive(Config, Debug)]
pub struct RecognizerConfig {
    #[config(default = "ClassifierConfig::new()")]
    pub classifier: ClassifierConfig,
    #[config(default = "ParameterLifecycle::PerCall")]
    pub lifecycle: ParameterLifecycle,
    /// Seed of the backend random generator, applied before each classifier is built.
    pub seed: Option<u64>,
}

impl RecognizerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Recognizer<B> {
        let mut recognizer = Recognizer {
            config: self.clone(),
            device: device.clone(),
            shared: None,
        };

        if self.lifecycle == ParameterLifecycle::Shared {
            recognizer.shared = Some(recognizer.build_classifier());
        }

        recognizer
    }
}

/// Best guess for an image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub character: char,
    /// Class index of `character` in the alphabet.
    pub index: usize,
    /// Raw, unnormalized score of the winning class.
    pub score: f32,
}

/// Runs the full pipeline: normalize, score, decode.
#[derive(Debug)]
pub struct Recognizer<B: Backend> {
    config: RecognizerConfig,
    device: B::Device,
    shared: Option<Classifier<B>>,
}

impl<B: Backend> Recognizer<B> {
    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    /// Recognizes the character drawn in a base64 encoded image.
    pub fn recognize(&self, encoded: &str) -> Result<char, RecognitionError> {
        self.predict(encoded).map(|prediction| prediction.character)
    }

    /// Same as [recognize](Self::recognize), also returning the winning class and its score.
    pub fn predict(&self, encoded: &str) -> Result<Prediction, RecognitionError> {
        let size = self.config.classifier.input_size;
        let input = normalize_with_size::<B>(encoded, size, &self.device)?;

        let scores = match &self.shared {
            Some(classifier) => classifier.score(input)?,
            None => self.build_classifier().score(input)?,
        };

        let character = decoder::decode(&scores)?;
        let index = decoder::argmax(&scores).unwrap_or_default();
        let prediction = Prediction {
            character,
            index,
            score: scores[index],
        };
        log::debug!("Predicted {prediction:?}");

        Ok(prediction)
    }

    fn build_classifier(&self) -> Classifier<B> {
        if let Some(seed) = self.config.seed {
            B::seed(seed);
        }

        self.config.classifier.init(&self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{index_of, NUM_CLASSES};
    use crate::error::{DecodeError, ImageProcessingError};
    use crate::normalizer::tests::encode;
    use crate::TestBackend;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma};

    fn stroke() -> String {
        let image = GrayImage::from_fn(60, 80, |x, y| {
            if y < 12 || (x + y / 2 > 40 && x + y / 2 < 52) {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        encode(&DynamicImage::ImageLuma8(image), ImageFormat::Png)
    }

    #[test]
    fn per_call_recognizer_returns_alphabet_character() {
        let recognizer = RecognizerConfig::new().init::<TestBackend>(&Default::default());

        let prediction = recognizer.predict(&stroke()).unwrap();

        assert_eq!(index_of(prediction.character), Some(prediction.index));
        assert!(prediction.index < NUM_CLASSES);
        assert!(prediction.score.is_finite());
    }

    #[test]
    fn shared_recognizer_is_stable_across_calls() {
        let recognizer = RecognizerConfig::new()
            .with_lifecycle(ParameterLifecycle::Shared)
            .init::<TestBackend>(&Default::default());
        let encoded = stroke();

        let first = recognizer.predict(&encoded).unwrap();
        let second = recognizer.predict(&encoded).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn only_shared_lifecycle_builds_up_front() {
        let device = Default::default();

        let per_call = RecognizerConfig::new().init::<TestBackend>(&device);
        let shared = RecognizerConfig::new()
            .with_lifecycle(ParameterLifecycle::Shared)
            .init::<TestBackend>(&device);

        assert!(per_call.shared.is_none());
        assert!(shared.shared.is_some());
        assert_eq!(per_call.config().lifecycle, ParameterLifecycle::PerCall);
        assert_eq!(shared.config().lifecycle, ParameterLifecycle::Shared);
    }

    #[test]
    fn input_size_follows_classifier_config() {
        let config =
            RecognizerConfig::new().with_classifier(ClassifierConfig::new().with_input_size(16));
        let recognizer = config.init::<TestBackend>(&Default::default());

        assert!(recognizer.recognize(&stroke()).is_ok());
    }

    #[test]
    fn class_count_mismatch_is_a_decode_error() {
        let config =
            RecognizerConfig::new().with_classifier(ClassifierConfig::new().with_num_classes(10));
        let recognizer = config.init::<TestBackend>(&Default::default());

        let err = recognizer.recognize(&stroke()).unwrap_err();

        assert!(matches!(
            err,
            RecognitionError::Decode(DecodeError::Length {
                expected: NUM_CLASSES,
                actual: 10
            })
        ));
    }

    #[test]
    fn image_errors_are_wrapped() {
        let recognizer = RecognizerConfig::new().init::<TestBackend>(&Default::default());

        let err = recognizer.recognize("not-base64!!").unwrap_err();

        assert!(matches!(
            err,
            RecognitionError::ImageProcessing(ImageProcessingError::Base64(_))
        ));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = RecognizerConfig::new()
            .with_lifecycle(ParameterLifecycle::Shared)
            .with_seed(Some(7));

        let restored = RecognizerConfig::load_binary(config.to_string().as_bytes()).unwrap();

        assert_eq!(restored.lifecycle, ParameterLifecycle::Shared);
        assert_eq!(restored.seed, Some(7));
        assert_eq!(restored.classifier.flattened_size(), 3136);
    }
}
