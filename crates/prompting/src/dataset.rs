//! Indexable datasets of encoded prompts.
//!
//! Two materialization strategies are available:
//! - `EagerDataset` renders and encodes every record up front and serves
//!   the cached examples; it is read-only afterwards.
//! - `LazyDataset` renders and encodes a record on every access.
//!
//! `Materialization::for_split` picks the strategy the pipeline uses: only
//! the training split is lazy, and only when preprocessing is not forced.

use crate::encoder::{EncodedExample, RecordEncoder};
use crate::error::{PromptError, Result};
use crate::processor::LABELS;
use crate::progress::progress_bar;
use crate::template::Template;
use data_loader::{ItemId, Label, Split, TrainingRecord};
use rayon::prelude::*;
use tracing::info;

/// Random-access view over encoded examples
pub trait PromptDataset: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encoded example at `index`
    fn get(&self, index: usize) -> Result<EncodedExample>;

    /// Source record at `index`
    fn record(&self, index: usize) -> Option<&TrainingRecord>;

    /// Label vocabulary, always `[0, 1]`
    fn labels(&self) -> &[Label] {
        &LABELS
    }
}

/// When a dataset renders and encodes its records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialization {
    Eager,
    Lazy,
}

impl Materialization {
    pub fn for_split(split: Split, always_preprocess: bool) -> Self {
        if split == Split::Train && !always_preprocess {
            Materialization::Lazy
        } else {
            Materialization::Eager
        }
    }
}

/// Renders a record and encodes the prompt with the record's label
#[derive(Clone)]
pub struct PromptConverter {
    template: Template,
    encoder: RecordEncoder,
}

impl PromptConverter {
    pub fn new(template: Template, encoder: RecordEncoder) -> Self {
        Self { template, encoder }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn encoder(&self) -> &RecordEncoder {
        &self.encoder
    }

    pub fn render(&self, record: &TrainingRecord) -> Result<String> {
        self.template.render_record(record)
    }

    pub fn convert(&self, record: &TrainingRecord) -> Result<EncodedExample> {
        let prompt = self.render(record)?;
        self.encoder.encode(&prompt, record.label())
    }
}

/// Dataset with every example encoded at construction
pub struct EagerDataset {
    records: Vec<TrainingRecord>,
    examples: Vec<EncodedExample>,
}

impl EagerDataset {
    pub fn new(records: Vec<TrainingRecord>, converter: &PromptConverter) -> Result<Self> {
        if let Some(first) = records.first() {
            info!("*** Example ***");
            info!("text: {}", converter.render(first)?);
        }

        let pb = progress_bar(records.len(), "Encoding");
        let examples = records
            .par_iter()
            .map(|record| {
                let example = converter.convert(record);
                pb.inc(1);
                example
            })
            .collect::<Result<Vec<_>>>()?;
        pb.finish_and_clear();

        info!("Encoded {} examples", examples.len());
        Ok(Self { records, examples })
    }
}

impl PromptDataset for EagerDataset {
    fn len(&self) -> usize {
        self.examples.len()
    }

    fn get(&self, index: usize) -> Result<EncodedExample> {
        self.examples
            .get(index)
            .cloned()
            .ok_or(PromptError::IndexOutOfBounds {
                index,
                len: self.examples.len(),
            })
    }

    fn record(&self, index: usize) -> Option<&TrainingRecord> {
        self.records.get(index)
    }
}

/// Dataset that encodes on access
pub struct LazyDataset {
    records: Vec<TrainingRecord>,
    converter: PromptConverter,
}

impl LazyDataset {
    pub fn new(records: Vec<TrainingRecord>, converter: PromptConverter) -> Self {
        Self { records, converter }
    }
}

impl PromptDataset for LazyDataset {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn get(&self, index: usize) -> Result<EncodedExample> {
        let record = self.records.get(index).ok_or(PromptError::IndexOutOfBounds {
            index,
            len: self.records.len(),
        })?;
        self.converter.convert(record)
    }

    fn record(&self, index: usize) -> Option<&TrainingRecord> {
        self.records.get(index)
    }
}

/// Build a dataset with the chosen materialization
pub fn build_dataset(
    records: Vec<TrainingRecord>,
    converter: PromptConverter,
    materialization: Materialization,
) -> Result<Box<dyn PromptDataset>> {
    Ok(match materialization {
        Materialization::Eager => Box::new(EagerDataset::new(records, &converter)?),
        Materialization::Lazy => Box::new(LazyDataset::new(records, converter)),
    })
}

/// Every example of a dataset, in index order
pub fn encode_all(dataset: &dyn PromptDataset) -> Result<Vec<EncodedExample>> {
    (0..dataset.len()).map(|i| dataset.get(i)).collect()
}

/// Item texts shortened to the encoder's maximum length
pub struct TruncateDataset {
    texts: Vec<(ItemId, String)>,
}

impl TruncateDataset {
    pub fn new(texts: Vec<(ItemId, String)>, encoder: &RecordEncoder) -> Result<Self> {
        let pb = progress_bar(texts.len(), "Truncating");
        let texts = texts
            .into_par_iter()
            .map(|(item_id, text)| {
                let truncated = encoder.truncate_text(&text);
                pb.inc(1);
                Ok((item_id, truncated?))
            })
            .collect::<Result<Vec<_>>>()?;
        pb.finish_and_clear();
        Ok(Self { texts })
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Truncated `(item_id, text)` pairs, in input order
    pub fn texts(&self) -> &[(ItemId, String)] {
        &self.texts
    }

    pub fn into_texts(self) -> Vec<(ItemId, String)> {
        self.texts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateVariant;
    use crate::test_utils::WordTokenizer;
    use data_loader::PlainRecord;
    use std::sync::Arc;

    const TEMPLATE: &str = "Does user *user_id* like *item_text* ? User likes the book genres *user_genres*";

    fn converter(max_length: usize) -> PromptConverter {
        let template = Template::new(TEMPLATE, TemplateVariant::Plain).unwrap();
        let encoder = RecordEncoder::new(
            Arc::new(WordTokenizer::new()),
            Some("{0:'no',1:'yes'}".parse().unwrap()),
            max_length,
        );
        PromptConverter::new(template, encoder)
    }

    fn record(item_id: u32, label: Option<u8>) -> TrainingRecord {
        TrainingRecord::Plain(PlainRecord {
            user_id: 9,
            item_id,
            label,
            user_genres: String::new(),
            item_genre: String::new(),
            item_text: format!("book {}", item_id),
        })
    }

    #[test]
    fn test_materialization_for_split() {
        assert_eq!(Materialization::for_split(Split::Train, false), Materialization::Lazy);
        assert_eq!(Materialization::for_split(Split::Train, true), Materialization::Eager);
        assert_eq!(Materialization::for_split(Split::Dev, false), Materialization::Eager);
        assert_eq!(Materialization::for_split(Split::Test, false), Materialization::Eager);
    }

    #[test]
    fn test_eager_and_lazy_agree() {
        let records = vec![record(1, Some(1)), record(2, Some(0)), record(3, None)];
        let eager = build_dataset(records.clone(), converter(64), Materialization::Eager).unwrap();
        let lazy = build_dataset(records, converter(64), Materialization::Lazy).unwrap();

        assert_eq!(eager.len(), 3);
        assert_eq!(encode_all(eager.as_ref()).unwrap(), encode_all(lazy.as_ref()).unwrap());
        assert!(eager.get(2).unwrap().labels.is_none());
        assert_eq!(eager.record(1).map(|r| r.item_id()), Some(2));
        assert_eq!(lazy.labels(), &[0, 1]);
    }

    #[test]
    fn test_out_of_bounds() {
        let lazy = LazyDataset::new(vec![record(1, Some(1))], converter(8));
        assert!(matches!(
            lazy.get(1),
            Err(PromptError::IndexOutOfBounds { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_truncate_dataset() {
        let encoder = converter(3).encoder().clone();
        let dataset = TruncateDataset::new(
            vec![(1, "one two three four".to_string()), (2, "short".to_string())],
            &encoder,
        )
        .unwrap();

        assert_eq!(
            dataset.texts(),
            &[(1, "one two three".to_string()), (2, "short".to_string())]
        );
    }
}
