//! Task selection and split loading.
//!
//! A task fixes the record variant and the filters applied before records
//! become prompts. Splits are read from the processed directory written by
//! the profile builder.

use crate::error::{PromptError, Result};
use crate::filter_pipeline::FilterPipeline;
use crate::filters::{CompleteAttributesFilter, NonEmptyTextFilter};
use crate::template::TemplateVariant;
use data_loader::{
    DataIndex, DataPaths, ItemTexts, Label, ProcessedRow, Split, TrainingRecord, attach_texts,
    parser,
};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Fixed label vocabulary of every task
pub const LABELS: [Label; 2] = [0, 1];

/// Experiment task named in the params file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Prompts built from the book's text
    Dbbook,
    /// Prompts built from the book's DBpedia attributes
    DbbookStructured,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Dbbook => "dbbook",
            Task::DbbookStructured => "dbbook_structured",
        }
    }

    pub fn variant(&self) -> TemplateVariant {
        match self {
            Task::Dbbook => TemplateVariant::Plain,
            Task::DbbookStructured => TemplateVariant::Structured,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Task::DbbookStructured)
    }

    /// Filters establishing the variant's record invariant
    pub fn filters(&self) -> FilterPipeline {
        match self {
            Task::Dbbook => FilterPipeline::new().add_filter(NonEmptyTextFilter),
            Task::DbbookStructured => FilterPipeline::new().add_filter(CompleteAttributesFilter),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "dbbook" => Ok(Task::Dbbook),
            "dbbook_structured" => Ok(Task::DbbookStructured),
            _ => Err(PromptError::Config(format!("Task not found: {}", s))),
        }
    }
}

/// Plain records of `rows` whose book has a non-empty text
pub fn load_plain_records(rows: &[ProcessedRow], texts: &ItemTexts) -> Result<Vec<TrainingRecord>> {
    let records = attach_texts(rows, texts)?
        .into_iter()
        .map(TrainingRecord::Plain)
        .collect();
    Task::Dbbook.filters().apply(records)
}

/// Structured records of `rows` whose book has all five attributes
pub fn load_structured_records(
    rows: &[ProcessedRow],
    attributes: &DataIndex,
) -> Result<Vec<TrainingRecord>> {
    let records = attributes
        .attach_attributes(rows)
        .into_iter()
        .map(TrainingRecord::Structured)
        .collect();
    Task::DbbookStructured.filters().apply(records)
}

/// Loads the records of one task from the processed data directory
pub struct DbbookProcessor {
    paths: DataPaths,
    task: Task,
    attributes: Option<DataIndex>,
}

impl DbbookProcessor {
    /// Create a processor; the structured task loads the attribute table once.
    pub fn new(paths: DataPaths, task: Task) -> Result<Self> {
        let attributes = match task {
            Task::Dbbook => None,
            Task::DbbookStructured => {
                let items = parser::parse_item_attributes(&paths.item_attributes())?;
                Some(DataIndex::from_parts(Vec::new(), items))
            }
        };
        Ok(Self {
            paths,
            task,
            attributes,
        })
    }

    pub fn task(&self) -> Task {
        self.task
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    pub fn labels(&self) -> &'static [Label] {
        &LABELS
    }

    /// Filtered, labelled records of a split
    pub fn examples(&self, split: Split) -> Result<Vec<TrainingRecord>> {
        let rows = parser::parse_processed_rows(&self.paths.processed_split(split))?;
        let records = self.records_for(&rows)?;
        info!(
            "Loaded {} {} records ({} rows) for task {}",
            records.len(),
            split,
            rows.len(),
            self.task
        );
        Ok(records)
    }

    /// Test records with their labels dropped, in join order
    pub fn candidates(&self) -> Result<Vec<TrainingRecord>> {
        Ok(self
            .examples(Split::Test)?
            .into_iter()
            .map(TrainingRecord::into_candidate)
            .collect())
    }

    fn records_for(&self, rows: &[ProcessedRow]) -> Result<Vec<TrainingRecord>> {
        match &self.attributes {
            Some(index) => load_structured_records(rows, index),
            None => load_plain_records(rows, &ItemTexts::new(self.paths.processed_texts())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::ItemAttributes;
    use tempfile::TempDir;

    fn row(user_id: u32, item_id: u32, label: u8, user_genres: &str) -> ProcessedRow {
        ProcessedRow {
            user_id,
            item_id,
            label,
            user_genres: user_genres.to_string(),
            item_genre: "Fantasy".to_string(),
        }
    }

    #[test]
    fn test_task_names() {
        assert_eq!("dbbook".parse::<Task>().unwrap(), Task::Dbbook);
        assert_eq!("DBBOOK_structured".parse::<Task>().unwrap(), Task::DbbookStructured);
        assert!("movielens".parse::<Task>().is_err());
        assert_eq!(Task::DbbookStructured.variant(), TemplateVariant::Structured);
    }

    #[test]
    fn test_load_plain_records_requires_text() {
        let dir = TempDir::new().unwrap();
        let texts = ItemTexts::new(dir.path());
        texts.write(1, "A hobbit's tale.").unwrap();

        let records = load_plain_records(&[row(1, 1, 1, ""), row(1, 2, 0, "")], &texts).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].item_id(), 1);
        assert_eq!(records[0].label(), Some(1));
    }

    #[test]
    fn test_load_structured_records_requires_attributes() {
        let complete = ItemAttributes {
            item_id: 1,
            author: "a".into(),
            genre: "Fantasy".into(),
            series: "s".into(),
            publisher: "p".into(),
            subject: "c,".into(),
        };
        let partial = ItemAttributes {
            series: String::new(),
            item_id: 2,
            ..complete.clone()
        };
        let index = DataIndex::from_parts(vec![], vec![complete, partial]);

        let records =
            load_structured_records(&[row(1, 1, 1, "Fantasy"), row(1, 2, 1, "Fantasy")], &index)
                .unwrap();
        assert_eq!(records.len(), 1);
        assert!(matches!(records[0], TrainingRecord::Structured(_)));
    }

    #[test]
    fn test_processor_candidates_drop_labels() {
        let dir = TempDir::new().unwrap();
        let paths = DataPaths::new(dir.path(), "dbbook");
        parser::write_processed_rows(
            &paths.processed_split(Split::Test),
            &[row(3, 10, 1, "Horror"), row(3, 11, 0, "Horror"), row(4, 12, 1, "")],
        )
        .unwrap();
        let texts = ItemTexts::new(paths.processed_texts());
        for item_id in [10, 11, 12] {
            texts.write(item_id, "text").unwrap();
        }

        let processor = DbbookProcessor::new(paths, Task::Dbbook).unwrap();
        let candidates = processor.candidates().unwrap();

        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|c| c.label().is_none()));
        assert_eq!(processor.labels(), &[0, 1]);
    }
}
