//! Pads encoded examples into rectangular batches.

use crate::encoder::EncodedExample;
use crate::tokenizer::TokenId;
use serde::Serialize;

/// Label value ignored by the training loss
pub const LABEL_PAD_ID: i64 = -100;

/// Right-padded batch of examples
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    pub input_ids: Vec<Vec<TokenId>>,
    pub attention_mask: Vec<Vec<u8>>,
    /// Present only when every example carried labels
    pub labels: Option<Vec<Vec<i64>>>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Padded sequence length
    pub fn width(&self) -> usize {
        self.input_ids.first().map_or(0, Vec::len)
    }
}

/// Pad inputs with `pad_id`, masks with 0 and labels with [`LABEL_PAD_ID`].
pub fn collate(examples: &[EncodedExample], pad_id: TokenId) -> Batch {
    let width = examples.iter().map(EncodedExample::len).max().unwrap_or(0);

    let input_ids = examples
        .iter()
        .map(|e| pad(&e.input_ids, width, pad_id))
        .collect();
    let attention_mask = examples
        .iter()
        .map(|e| pad(&e.attention_mask, width, 0))
        .collect();

    let labels = examples
        .iter()
        .map(|e| e.labels.as_ref())
        .collect::<Option<Vec<_>>>()
        .filter(|_| !examples.is_empty())
        .map(|labels| {
            let label_width = labels.iter().map(|l| l.len()).max().unwrap_or(0);
            labels
                .into_iter()
                .map(|l| {
                    let widened: Vec<i64> = l.iter().map(|&id| i64::from(id)).collect();
                    pad(&widened, label_width, LABEL_PAD_ID)
                })
                .collect()
        });

    Batch {
        input_ids,
        attention_mask,
        labels,
    }
}

fn pad<T: Copy>(values: &[T], width: usize, fill: T) -> Vec<T> {
    let mut padded = Vec::with_capacity(width);
    padded.extend_from_slice(values);
    padded.resize(width, fill);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example(ids: &[u32], labels: Option<&[u32]>) -> EncodedExample {
        EncodedExample {
            input_ids: ids.to_vec(),
            attention_mask: vec![1; ids.len()],
            labels: labels.map(<[u32]>::to_vec),
        }
    }

    #[test]
    fn test_collate_pads_to_longest() {
        let batch = collate(
            &[example(&[5, 6, 7], Some(&[3, 1])), example(&[8], Some(&[2]))],
            0,
        );

        assert_eq!(batch.input_ids, vec![vec![5, 6, 7], vec![8, 0, 0]]);
        assert_eq!(batch.attention_mask, vec![vec![1, 1, 1], vec![1, 0, 0]]);
        assert_eq!(batch.labels, Some(vec![vec![3, 1], vec![2, LABEL_PAD_ID]]));
        assert_eq!(batch.width(), 3);
    }

    #[test]
    fn test_collate_unlabelled() {
        let batch = collate(&[example(&[1, 2], None), example(&[3], Some(&[4]))], 9);
        assert!(batch.labels.is_none());
        assert_eq!(batch.input_ids[1], vec![3, 9]);
    }

    #[test]
    fn test_collate_empty() {
        let batch = collate(&[], 0);
        assert!(batch.is_empty());
        assert!(batch.labels.is_none());
    }
}
