//! DataIndex building and the relational joins.
//!
//! This module turns raw TSV inputs into the joined views used by the
//! prompting crate:
//! - `DataIndex::load_from_files` parses the training ratings and the item
//!   attribute table in parallel and derives the genre preferences
//! - `join_split` left-joins any ratings split onto attributes and
//!   preferences, producing `ProcessedRow`s ordered by `(user_id, item_id)`
//! - `attach_texts` / `attach_attributes` build the template-ready records

use crate::error::Result;
use crate::parser;
use crate::texts::ItemTexts;
use crate::types::*;
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, info};

impl DataIndex {
    /// Load the training ratings and the item attribute table.
    ///
    /// The attribute table is built from the training split only and is
    /// reused for every split; the genre preferences come from the
    /// positively labelled training rows.
    pub fn load_from_files(train_ratings: &Path, item_attributes: &Path) -> Result<Self> {
        info!(
            "Loading training ratings from {:?} and item attributes from {:?}",
            train_ratings, item_attributes
        );

        let (ratings, items) = rayon::join(
            || parser::parse_ratings(train_ratings),
            || parser::parse_item_attributes(item_attributes),
        );
        let ratings = ratings?;
        let items = items?;

        info!("Loaded {} ratings, {} items", ratings.len(), items.len());

        Ok(Self::from_parts(ratings, items))
    }

    /// Build an index from already parsed rows
    pub fn from_parts(ratings: Vec<RatingRecord>, items: Vec<ItemAttributes>) -> Self {
        let mut index = DataIndex::new();
        for item in items {
            index.insert_item(item);
        }
        for rating in ratings {
            index.insert_rating(rating);
        }
        index.build_genre_preferences();
        index
    }

    /// Aggregate the liked genres of every user from positive training rows.
    ///
    /// Users whose positive items have no known genre still get an (empty)
    /// entry, exactly like users with no positives at all render the
    /// fallback clause.
    pub fn build_genre_preferences(&mut self) {
        let mut prefs = GenrePreferences::new();
        for (&user_id, ratings) in &self.user_ratings {
            for rating in ratings.iter().filter(|r| r.is_positive()) {
                prefs.touch(user_id);
                if let Some(item) = self.items.get(&rating.item_id) {
                    prefs.insert(user_id, &item.genre);
                }
            }
        }
        debug!("Built genre preferences for {} users", prefs.user_count());
        self.genre_preferences = prefs;
    }

    /// Left-join a ratings split onto item genres and user preferences.
    ///
    /// Unmatched items get an empty genre, unmatched users empty liked
    /// genres. The user's liked genres are their whole history and are not
    /// adjusted for the row's own item. Output is sorted by
    /// `(user_id, item_id)`; equal keys keep input order.
    pub fn join_split(&self, ratings: &[RatingRecord]) -> Vec<ProcessedRow> {
        let mut rows: Vec<ProcessedRow> = ratings
            .par_iter()
            .map(|rating| ProcessedRow {
                user_id: rating.user_id,
                item_id: rating.item_id,
                label: rating.label,
                user_genres: self.genre_preferences.joined(rating.user_id),
                item_genre: self
                    .items
                    .get(&rating.item_id)
                    .map(|item| item.genre.clone())
                    .unwrap_or_default(),
            })
            .collect();

        rows.sort_by_key(|row| (row.user_id, row.item_id));
        rows
    }

    /// Build attribute-aware records for processed rows.
    ///
    /// The row's own `item_genre` is kept; the other four attributes come
    /// from the item table, empty when the item is unknown.
    pub fn attach_attributes(&self, rows: &[ProcessedRow]) -> Vec<StructuredRecord> {
        rows.iter()
            .map(|row| {
                let fallback = ItemAttributes::empty(row.item_id);
                let item = self.items.get(&row.item_id).unwrap_or(&fallback);
                StructuredRecord {
                    user_id: row.user_id,
                    item_id: row.item_id,
                    label: Some(row.label),
                    user_genres: row.user_genres.clone(),
                    item_genre: row.item_genre.clone(),
                    item_author: item.author.clone(),
                    item_series: item.series.clone(),
                    item_publisher: item.publisher.clone(),
                    item_subject: item.subject.clone(),
                }
            })
            .collect()
    }
}

/// Build plain records for processed rows by reading each item's text.
///
/// Rows whose item has no text get an empty `item_text`; dropping them is
/// the caller's filter step.
pub fn attach_texts(rows: &[ProcessedRow], texts: &ItemTexts) -> Result<Vec<PlainRecord>> {
    rows.par_iter()
        .map(|row| {
            Ok(PlainRecord {
                user_id: row.user_id,
                item_id: row.item_id,
                label: Some(row.label),
                user_genres: row.user_genres.clone(),
                item_genre: row.item_genre.clone(),
                item_text: texts.read(row.item_id)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn item(item_id: ItemId, genre: &str) -> ItemAttributes {
        ItemAttributes {
            item_id,
            genre: genre.to_string(),
            ..ItemAttributes::empty(item_id)
        }
    }

    fn rating(user_id: UserId, item_id: ItemId, label: Label) -> RatingRecord {
        RatingRecord { user_id, item_id, label }
    }

    fn create_test_index() -> DataIndex {
        let items = vec![
            item(10, "Fantasy"),
            item(11, "Horror"),
            item(12, "Fantasy"),
            item(13, "Romance"),
            item(14, "Satire"),
        ];
        // User 1: three positives, two negatives
        let ratings = vec![
            rating(1, 10, 1),
            rating(1, 11, 1),
            rating(1, 12, 1),
            rating(1, 13, 0),
            rating(1, 14, 0),
            rating(2, 13, 0),
        ];
        DataIndex::from_parts(ratings, items)
    }

    #[test]
    fn test_liked_genres_come_from_positive_items_only() {
        let index = create_test_index();
        let prefs = index.genre_preferences();

        let liked: Vec<_> = prefs.liked_genres(1).unwrap().iter().cloned().collect();
        assert_eq!(liked, vec!["Fantasy".to_string(), "Horror".to_string()]);
        assert!(prefs.liked_genres(2).is_none());
    }

    #[test]
    fn test_join_is_left_join_sorted_by_user_and_item() {
        let index = create_test_index();
        let split = vec![rating(2, 99, 1), rating(1, 13, 0), rating(1, 10, 1)];

        let rows = index.join_split(&split);
        let keys: Vec<_> = rows.iter().map(|r| (r.user_id, r.item_id)).collect();
        assert_eq!(keys, vec![(1, 10), (1, 13), (2, 99)]);

        // Unknown item and user without positives: empty strings, not errors
        assert_eq!(rows[2].item_genre, "");
        assert_eq!(rows[2].user_genres, "");
    }

    #[test]
    fn test_liked_genres_not_deduplicated_against_row_item() {
        let index = create_test_index();
        let rows = index.join_split(&[rating(1, 10, 1)]);

        assert_eq!(rows[0].item_genre, "Fantasy");
        assert_eq!(rows[0].user_genres, "Fantasy, Horror");
    }

    #[test]
    fn test_attach_texts_leaves_missing_texts_empty() {
        let dir = TempDir::new().unwrap();
        let texts = ItemTexts::new(dir.path());
        texts.write(10, "Dragons and maps.").unwrap();

        let index = create_test_index();
        let rows = index.join_split(&[rating(1, 10, 1), rating(1, 11, 1)]);
        let records = attach_texts(&rows, &texts).unwrap();

        assert_eq!(records[0].item_text, "Dragons and maps.");
        assert_eq!(records[1].item_text, "");
    }

    #[test]
    fn test_attach_attributes_for_unknown_item() {
        let index = create_test_index();
        let rows = index.join_split(&[rating(1, 77, 0)]);
        let records = index.attach_attributes(&rows);

        assert_eq!(records[0].item_author, "");
        assert_eq!(records[0].label, Some(0));
    }

    #[test]
    fn test_load_from_files() {
        let dir = TempDir::new().unwrap();
        let ratings = dir.path().join("train.tsv");
        let items = dir.path().join("items.tsv");
        std::fs::write(&ratings, "1\t10\t1\n1\t11\t0\n").unwrap();
        std::fs::write(&items, "10\tA\tFantasy\tS\tP\tX,\n").unwrap();

        let index = DataIndex::load_from_files(&ratings, &items).unwrap();
        assert_eq!(index.counts(), (1, 1, 2));
        assert_eq!(index.genre_preferences().joined(1), "Fantasy");
    }

    #[test]
    fn test_load_from_files_rejects_non_binary_labels() {
        let dir = TempDir::new().unwrap();
        let train = dir.path().join("train.tsv");
        let items = dir.path().join("items.tsv");
        std::fs::write(&train, "1\t10\t1\n1\t11\t2\n").unwrap();
        std::fs::write(&items, "10\t\tFantasy\n").unwrap();

        let err = DataIndex::load_from_files(&train, &items).unwrap_err();
        assert!(matches!(
            err,
            crate::error::DataLoadError::InvalidValue { ref field, .. } if field == "label"
        ));
    }
}
