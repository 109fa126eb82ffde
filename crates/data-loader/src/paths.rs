//! On-disk layout of the pipeline's data directory.
//!
//! ```text
//! <root>/raw/<dataset>/{train,test}.tsv, texts/, mapping_entities.tsv, item-prop/train.tsv
//! <root>/interim/<dataset>/{train,dev,test}.tsv, item-prop/train.tsv
//! <root>/processed/<dataset>/{train,dev,test}.tsv, texts/
//! <root>/elliot/<dataset>[_structured]/{train,test}.tsv
//! ```

use crate::types::Split;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATASET: &str = "dbbook";

/// Resolves every file location of one dataset
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
    dataset: String,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>, dataset: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            dataset: dataset.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    fn stage(&self, stage: &str) -> PathBuf {
        self.root.join(stage).join(&self.dataset)
    }

    pub fn raw_split(&self, split: Split) -> PathBuf {
        self.stage("raw").join(split.file_name())
    }

    pub fn raw_texts(&self) -> PathBuf {
        self.stage("raw").join("texts")
    }

    pub fn raw_mapping_entities(&self) -> PathBuf {
        self.stage("raw").join("mapping_entities.tsv")
    }

    pub fn raw_item_properties(&self) -> PathBuf {
        self.stage("raw").join("item-prop").join("train.tsv")
    }

    pub fn interim_split(&self, split: Split) -> PathBuf {
        self.stage("interim").join(split.file_name())
    }

    /// The extracted item attribute table
    pub fn item_attributes(&self) -> PathBuf {
        self.stage("interim").join("item-prop").join("train.tsv")
    }

    pub fn processed_split(&self, split: Split) -> PathBuf {
        self.stage("processed").join(split.file_name())
    }

    pub fn processed_texts(&self) -> PathBuf {
        self.stage("processed").join("texts")
    }

    /// Directory of the external evaluator's inputs for a variant
    pub fn elliot_dir(&self, structured: bool) -> PathBuf {
        let name = if structured {
            format!("{}_structured", self.dataset)
        } else {
            self.dataset.clone()
        };
        self.root.join("elliot").join(name)
    }

    /// A split file exported for the external evaluator
    pub fn elliot_split(&self, structured: bool, split: Split) -> PathBuf {
        self.elliot_dir(structured).join(split.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = DataPaths::new("data", DEFAULT_DATASET);

        assert_eq!(
            paths.processed_split(Split::Test),
            PathBuf::from("data/processed/dbbook/test.tsv")
        );
        assert_eq!(
            paths.item_attributes(),
            PathBuf::from("data/interim/dbbook/item-prop/train.tsv")
        );
        assert_eq!(
            paths.elliot_dir(true),
            PathBuf::from("data/elliot/dbbook_structured")
        );
    }
}
