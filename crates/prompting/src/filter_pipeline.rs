//! The FilterPipeline chains record filters.

use crate::error::Result;
use crate::traits::Filter;
use data_loader::TrainingRecord;

/// Chains multiple filters together into a processing pipeline.
///
/// ## Usage
/// ```ignore
/// let pipeline = FilterPipeline::new()
///     .add_filter(NonEmptyTextFilter)
///     .add_filter(CompleteAttributesFilter);
///
/// let kept = pipeline.apply(records)?;
/// ```
pub struct FilterPipeline {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Add a filter to the pipeline (builder pattern).
    pub fn add_filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Apply all filters in sequence, logging the count each one drops.
    pub fn apply(&self, records: Vec<TrainingRecord>) -> Result<Vec<TrainingRecord>> {
        let mut current = records;
        for filter in &self.filters {
            let before = current.len();
            current = filter.apply(current)?;
            tracing::debug!(
                "Filter applied: {} ({} -> {} records)",
                filter.name(),
                before,
                current.len()
            );
        }
        Ok(current)
    }
}

impl Default for FilterPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::NonEmptyTextFilter;
    use data_loader::PlainRecord;

    fn record(item_id: u32, item_text: &str) -> TrainingRecord {
        TrainingRecord::Plain(PlainRecord {
            user_id: 1,
            item_id,
            label: Some(1),
            user_genres: String::new(),
            item_genre: String::new(),
            item_text: item_text.to_string(),
        })
    }

    #[test]
    fn test_empty_pipeline() {
        let pipeline = FilterPipeline::new();
        let kept = pipeline.apply(vec![record(1, ""), record(2, "text")]).unwrap();
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_single_filter() {
        let pipeline = FilterPipeline::new().add_filter(NonEmptyTextFilter);
        let kept = pipeline
            .apply(vec![record(1, ""), record(2, "text"), record(3, "more")])
            .unwrap();

        let ids: Vec<u32> = kept.iter().map(|r| r.item_id()).collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
