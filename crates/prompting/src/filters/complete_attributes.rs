//! Keeps structured records only when every attribute is known.

use crate::error::Result;
use crate::traits::Filter;
use data_loader::TrainingRecord;

/// Removes structured records missing any of genre, author, series,
/// publisher or subject.
///
/// Plain records pass through untouched.
pub struct CompleteAttributesFilter;

impl Filter for CompleteAttributesFilter {
    fn name(&self) -> &str {
        "CompleteAttributesFilter"
    }

    fn apply(&self, records: Vec<TrainingRecord>) -> Result<Vec<TrainingRecord>> {
        Ok(records
            .into_iter()
            .filter(|record| match record {
                TrainingRecord::Structured(r) => {
                    !r.item_genre.is_empty()
                        && !r.item_author.is_empty()
                        && !r.item_series.is_empty()
                        && !r.item_publisher.is_empty()
                        && !r.item_subject.is_empty()
                }
                TrainingRecord::Plain(_) => true,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::StructuredRecord;

    fn record(item_id: u32, series: &str) -> TrainingRecord {
        TrainingRecord::Structured(StructuredRecord {
            user_id: 4,
            item_id,
            label: Some(1),
            user_genres: String::new(),
            item_genre: "Science_fiction".into(),
            item_author: "Isaac_Asimov".into(),
            item_series: series.into(),
            item_publisher: "Gnome_Press".into(),
            item_subject: "1951_novels,".into(),
        })
    }

    #[test]
    fn test_complete_attributes_filter() {
        let kept = CompleteAttributesFilter
            .apply(vec![record(1, "Foundation_series"), record(2, "")])
            .unwrap();

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].item_id(), 1);
    }
}
