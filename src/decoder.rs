use burn::tensor::{backend::Backend, Tensor};

use crate::error::DecodeError;

/// Characters the classifier can emit, in class index order.
const ALPHABET: &[u8; NUM_CLASSES] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Number of output classes: ten digits, then uppercase and lowercase latin letters.
pub const NUM_CLASSES: usize = 62;

/// Returns the character of a class index, if the index is in range.
pub fn character(index: usize) -> Option<char> {
    ALPHABET.get(index).map(|&byte| byte as char)
}

/// Returns the class index of a character, if it belongs to the alphabet.
pub fn index_of(character: char) -> Option<usize> {
    ALPHABET.iter().position(|&byte| byte as char == character)
}

/// Index of the largest score, first occurrence wins on ties.
///
/// NaN never wins against a number, so an all-NaN vector resolves to index 0.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let (first, rest) = scores.split_first()?;
    let mut best = (0, *first);

    for (offset, &score) in rest.iter().enumerate() {
        if score > best.1 || (best.1.is_nan() && !score.is_nan()) {
            best = (offset + 1, score);
        }
    }

    Some(best.0)
}

/// Decodes raw class scores into the best matching character.
pub fn decode(scores: &[f32]) -> Result<char, DecodeError> {
    if scores.len() != NUM_CLASSES {
        return Err(DecodeError::Length {
            expected: NUM_CLASSES,
            actual: scores.len(),
        });
    }

    let index = argmax(scores).unwrap_or_default();
    Ok(ALPHABET[index] as char)
}

/// Reads the scores of a single item out of a `[1, num_classes]` tensor.
pub fn scores_from_tensor<B: Backend>(scores: Tensor<B, 2>) -> Result<Vec<f32>, DecodeError> {
    let [batch_size, _num_classes] = scores.dims();
    if batch_size != 1 {
        return Err(DecodeError::Batch(batch_size));
    }

    scores
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| DecodeError::Data(format!("{err:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestBackend;
    use burn::tensor::TensorData;
    use rstest::rstest;

    fn one_hot(index: usize) -> Vec<f32> {
        let mut scores = vec![0.0; NUM_CLASSES];
        scores[index] = 1.0;
        scores
    }

    #[test]
    fn equal_scores_pick_the_first_class() {
        assert_eq!(decode(&[0.5; NUM_CLASSES]), Ok('0'));
    }

    #[rstest]
    #[case(0, '0')]
    #[case(9, '9')]
    #[case(10, 'A')]
    #[case(35, 'Z')]
    #[case(36, 'a')]
    #[case(61, 'z')]
    fn decodes_class_index(#[case] index: usize, #[case] expected: char) {
        assert_eq!(decode(&one_hot(index)), Ok(expected));
    }

    #[test]
    fn alphabet_is_digits_upper_lower() {
        let alphabet: String = (0..NUM_CLASSES).filter_map(character).collect();
        let expected: String = ('0'..='9').chain('A'..='Z').chain('a'..='z').collect();

        assert_eq!(alphabet, expected);
        assert_eq!(character(NUM_CLASSES), None);
    }

    #[test]
    fn index_of_inverts_character() {
        for index in 0..NUM_CLASSES {
            assert_eq!(index_of(character(index).unwrap()), Some(index));
        }
        assert_eq!(index_of('!'), None);
    }

    #[test]
    fn ties_resolve_to_lowest_index() {
        let mut scores = vec![-1.0; NUM_CLASSES];
        scores[12] = 3.0;
        scores[40] = 3.0;

        assert_eq!(decode(&scores), Ok('C'));
    }

    #[test]
    fn negative_scores_still_decode() {
        let mut scores: Vec<f32> = (0..NUM_CLASSES).map(|i| -100.0 - i as f32).collect();
        scores[50] = -0.5;

        assert_eq!(decode(&scores), Ok('o'));
    }

    #[test]
    fn nan_never_wins() {
        let mut scores = vec![f32::NAN; NUM_CLASSES];
        assert_eq!(argmax(&scores), Some(0));

        scores[20] = -7.0;
        assert_eq!(argmax(&scores), Some(20));
        assert_eq!(decode(&scores), Ok('K'));
    }

    #[rstest]
    #[case(0)]
    #[case(61)]
    #[case(63)]
    fn wrong_length_is_rejected(#[case] length: usize) {
        assert_eq!(
            decode(&vec![0.0; length]),
            Err(DecodeError::Length {
                expected: NUM_CLASSES,
                actual: length
            })
        );
    }

    #[test]
    fn reads_single_item_tensor() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(one_hot(35), [1, NUM_CLASSES]),
            &device,
        );

        let scores = scores_from_tensor(tensor).unwrap();

        assert_eq!(scores.len(), NUM_CLASSES);
        assert_eq!(decode(&scores), Ok('Z'));
    }

    #[test]
    fn rejects_batched_tensor() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 2>::zeros([2, NUM_CLASSES], &device);

        assert_eq!(scores_from_tensor(tensor), Err(DecodeError::Batch(2)));
    }
}
