//! # Data Loader Crate
//!
//! This crate loads the DBbook rating data and joins it into the records
//! the prompting pipeline renders.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (ratings, item attributes, joined records)
//! - **parser**: Parse and write the headerless TSV files
//! - **texts**: Per-item body text files
//! - **index**: `DataIndex` loading and the relational joins
//! - **split**: Per-user train/dev split
//! - **features**: Item attribute extraction from DBpedia mappings
//! - **elliot**: Exports for the external top-N evaluator
//! - **paths**: Data directory layout
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{DataIndex, DataPaths, Split, parser};
//!
//! let paths = DataPaths::new("data", "dbbook");
//! let index = DataIndex::load_from_files(
//!     &paths.interim_split(Split::Train),
//!     &paths.item_attributes(),
//! )?;
//!
//! let test = parser::parse_ratings(&paths.interim_split(Split::Test))?;
//! let rows = index.join_split(&test);
//! ```

pub mod elliot;
pub mod error;
pub mod features;
pub mod index;
pub mod parser;
pub mod paths;
pub mod split;
pub mod texts;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{DataLoadError, Result};
pub use index::attach_texts;
pub use paths::{DataPaths, DEFAULT_DATASET};
pub use texts::ItemTexts;
pub use types::{
    // Type aliases
    ItemId,
    Label,
    UserId,
    // Core types
    DataIndex,
    GenrePreferences,
    ItemAttributes,
    PlainRecord,
    ProcessedRow,
    RatingRecord,
    Split,
    StructuredRecord,
    TrainingRecord,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_index_creation() {
        let index = DataIndex::new();
        let (users, items, ratings) = index.counts();

        assert_eq!(users, 0);
        assert_eq!(items, 0);
        assert_eq!(ratings, 0);
    }

    #[test]
    fn test_insert_item() {
        let mut index = DataIndex::new();

        index.insert_item(ItemAttributes {
            item_id: 1,
            author: "Mary_Shelley".to_string(),
            genre: "Gothic_fiction".to_string(),
            ..ItemAttributes::empty(1)
        });

        let retrieved = index.get_item(1).unwrap();
        assert_eq!(retrieved.author, "Mary_Shelley");
        assert!(!retrieved.is_complete());
    }

    #[test]
    fn test_insert_rating() {
        let mut index = DataIndex::new();

        index.insert_rating(RatingRecord {
            user_id: 1,
            item_id: 1193,
            label: 1,
        });

        let user_ratings = index.get_user_ratings(1);
        assert_eq!(user_ratings.len(), 1);
        assert!(user_ratings[0].is_positive());
    }
}
