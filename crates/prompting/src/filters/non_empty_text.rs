//! Drops plain records whose book has no text.

use crate::error::Result;
use crate::traits::Filter;
use data_loader::TrainingRecord;

/// Removes plain records with an empty `item_text`.
///
/// Structured records pass through untouched.
pub struct NonEmptyTextFilter;

impl Filter for NonEmptyTextFilter {
    fn name(&self) -> &str {
        "NonEmptyTextFilter"
    }

    fn apply(&self, records: Vec<TrainingRecord>) -> Result<Vec<TrainingRecord>> {
        Ok(records
            .into_iter()
            .filter(|record| match record {
                TrainingRecord::Plain(r) => !r.item_text.is_empty(),
                TrainingRecord::Structured(_) => true,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{PlainRecord, StructuredRecord};

    fn plain(item_id: u32, item_text: &str) -> TrainingRecord {
        TrainingRecord::Plain(PlainRecord {
            user_id: 1,
            item_id,
            label: Some(0),
            user_genres: "Horror".into(),
            item_genre: "Horror".into(),
            item_text: item_text.into(),
        })
    }

    #[test]
    fn test_non_empty_text_filter() {
        let structured = TrainingRecord::Structured(StructuredRecord {
            user_id: 1,
            item_id: 3,
            label: None,
            user_genres: String::new(),
            item_genre: String::new(),
            item_author: String::new(),
            item_series: String::new(),
            item_publisher: String::new(),
            item_subject: String::new(),
        });

        let kept = NonEmptyTextFilter
            .apply(vec![plain(1, "It was a dark night."), plain(2, ""), structured.clone()])
            .unwrap();
        assert_eq!(kept, vec![plain(1, "It was a dark night."), structured]);
    }
}
