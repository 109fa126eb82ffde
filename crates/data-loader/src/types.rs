//! Core domain types for the DBbook prompting dataset.
//!
//! Everything downstream (prompt rendering, encoding, ranking) works on the
//! types defined here:
//! - Type aliases for ids and labels
//! - Raw TSV rows (`RatingRecord`, `ItemAttributes`, `ProcessedRow`)
//! - The joined, template-ready records (`PlainRecord`, `StructuredRecord`)
//! - `DataIndex`, the in-memory table of item attributes, training ratings
//!   and per-user genre preferences

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::DataLoadError;

// =============================================================================
// Type Aliases
// =============================================================================

/// Unique identifier for a user
pub type UserId = u32;

/// Unique identifier for a book
pub type ItemId = u32;

/// Binary interaction label (1 = liked, 0 = not liked)
pub type Label = u8;

// =============================================================================
// Splits
// =============================================================================

/// Dataset split a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Dev,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Dev, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Dev => "dev",
            Split::Test => "test",
        }
    }

    /// File name used for this split in every data stage (`train.tsv`, ...)
    pub fn file_name(&self) -> String {
        format!("{}.tsv", self.as_str())
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = DataLoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Split::Train),
            "dev" => Ok(Split::Dev),
            "test" => Ok(Split::Test),
            _ => Err(DataLoadError::InvalidValue {
                field: "split".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

// =============================================================================
// Raw rows
// =============================================================================

/// A single `(user, item, label)` interaction from a ratings split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RatingRecord {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub label: Label,
}

impl RatingRecord {
    pub fn is_positive(&self) -> bool {
        self.label == 1
    }
}

/// Attributes of a book extracted from DBpedia.
///
/// Missing attributes are empty strings, never absent, so prompt
/// substitution never has to special-case them. `subject` holds several
/// comma-terminated categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAttributes {
    pub item_id: ItemId,
    pub author: String,
    pub genre: String,
    pub series: String,
    pub publisher: String,
    pub subject: String,
}

impl ItemAttributes {
    /// Attributes row for an item nothing is known about
    pub fn empty(item_id: ItemId) -> Self {
        Self {
            item_id,
            ..Default::default()
        }
    }

    /// True when every attribute used by the structured template is present
    pub fn is_complete(&self) -> bool {
        !self.author.is_empty()
            && !self.genre.is_empty()
            && !self.series.is_empty()
            && !self.publisher.is_empty()
            && !self.subject.is_empty()
    }
}

/// A joined split row as persisted under `processed/`:
/// `user_id, item_id, label, user_genres, item_genre`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedRow {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub label: Label,
    /// Comma-joined liked genres of the user, possibly empty
    pub user_genres: String,
    /// Genre of the row's item, possibly empty
    pub item_genre: String,
}

// =============================================================================
// Template-ready records
// =============================================================================

/// Record for the plain template: identifiers, genres and the book's text.
///
/// `label` is `None` for ranking candidates, whose label is unknown at
/// inference time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainRecord {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub label: Option<Label>,
    pub user_genres: String,
    pub item_genre: String,
    pub item_text: String,
}

/// Record for the attribute-aware template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredRecord {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub label: Option<Label>,
    pub user_genres: String,
    pub item_genre: String,
    pub item_author: String,
    pub item_series: String,
    pub item_publisher: String,
    pub item_subject: String,
}

/// One record of either template variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingRecord {
    Plain(PlainRecord),
    Structured(StructuredRecord),
}

impl TrainingRecord {
    pub fn user_id(&self) -> UserId {
        match self {
            TrainingRecord::Plain(r) => r.user_id,
            TrainingRecord::Structured(r) => r.user_id,
        }
    }

    pub fn item_id(&self) -> ItemId {
        match self {
            TrainingRecord::Plain(r) => r.item_id,
            TrainingRecord::Structured(r) => r.item_id,
        }
    }

    pub fn label(&self) -> Option<Label> {
        match self {
            TrainingRecord::Plain(r) => r.label,
            TrainingRecord::Structured(r) => r.label,
        }
    }

    pub fn user_genres(&self) -> &str {
        match self {
            TrainingRecord::Plain(r) => &r.user_genres,
            TrainingRecord::Structured(r) => &r.user_genres,
        }
    }

    /// Drop the label, turning the record into a ranking candidate
    pub fn into_candidate(self) -> Self {
        match self {
            TrainingRecord::Plain(r) => TrainingRecord::Plain(PlainRecord { label: None, ..r }),
            TrainingRecord::Structured(r) => {
                TrainingRecord::Structured(StructuredRecord { label: None, ..r })
            }
        }
    }
}

// =============================================================================
// Genre preferences
// =============================================================================

/// Liked genres per user, aggregated from positively labelled training rows.
///
/// Genres are kept in a `BTreeSet` so the serialized form is deterministic;
/// the order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenrePreferences {
    by_user: HashMap<UserId, BTreeSet<String>>,
}

impl GenrePreferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `user_id` liked an item of `genre`. Empty genres are ignored.
    pub fn insert(&mut self, user_id: UserId, genre: &str) {
        if genre.is_empty() {
            return;
        }
        self.by_user
            .entry(user_id)
            .or_default()
            .insert(genre.to_string());
    }

    /// Make sure `user_id` has an entry, even without any known genre
    pub fn touch(&mut self, user_id: UserId) {
        self.by_user.entry(user_id).or_default();
    }

    pub fn liked_genres(&self, user_id: UserId) -> Option<&BTreeSet<String>> {
        self.by_user.get(&user_id)
    }

    /// Serialized liked genres (`"Fantasy, Horror"`), empty when unknown
    pub fn joined(&self, user_id: UserId) -> String {
        self.by_user
            .get(&user_id)
            .map(|genres| genres.iter().map(String::as_str).collect::<Vec<_>>().join(", "))
            .unwrap_or_default()
    }

    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }
}

// =============================================================================
// DataIndex - item attributes and training history
// =============================================================================

/// In-memory tables the joiner reads from.
///
/// Holds the item attribute table (built from the training split and reused
/// for every split), the training ratings per user, and the genre
/// preferences derived from them.
#[derive(Debug, Default)]
pub struct DataIndex {
    pub(crate) items: HashMap<ItemId, ItemAttributes>,
    pub(crate) user_ratings: HashMap<UserId, Vec<RatingRecord>>,
    pub(crate) genre_preferences: GenrePreferences,
}

impl DataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_item(&self, id: ItemId) -> Option<&ItemAttributes> {
        self.items.get(&id)
    }

    /// Training ratings of a user, empty slice if the user is unknown
    pub fn get_user_ratings(&self, user_id: UserId) -> &[RatingRecord] {
        self.user_ratings
            .get(&user_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn genre_preferences(&self) -> &GenrePreferences {
        &self.genre_preferences
    }

    pub fn insert_item(&mut self, item: ItemAttributes) {
        self.items.insert(item.item_id, item);
    }

    pub fn insert_rating(&mut self, rating: RatingRecord) {
        self.user_ratings
            .entry(rating.user_id)
            .or_default()
            .push(rating);
    }

    /// `(users, items, ratings)` counts for logging and validation
    pub fn counts(&self) -> (usize, usize, usize) {
        let total_ratings = self.user_ratings.values().map(|v| v.len()).sum();
        (self.user_ratings.len(), self.items.len(), total_ratings)
    }
}
