//! Exports for the external top-N evaluation framework.
//!
//! The evaluator consumes positive-only interaction files and ranked
//! predictions. Test interactions are restricted to the items the
//! prompting model could actually score: items with a text for the plain
//! variant, items with complete attributes for the structured variant.

use crate::error::Result;
use crate::parser;
use crate::paths::DataPaths;
use crate::texts::ItemTexts;
use crate::types::{DataIndex, ItemId, RatingRecord, Split, UserId};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Keep only interactions labelled positive
pub fn positive_interactions(ratings: &[RatingRecord]) -> Vec<RatingRecord> {
    ratings.iter().filter(|r| r.label != 0).copied().collect()
}

/// Positive test interactions whose item has a non-empty text
pub fn scorable_by_text(test: &[RatingRecord], texts: &ItemTexts) -> Result<Vec<RatingRecord>> {
    let mut kept = Vec::new();
    for rating in positive_interactions(test) {
        if !texts.read(rating.item_id)?.is_empty() {
            kept.push(rating);
        }
    }
    info!("{} positive test interactions have item texts", kept.len());
    Ok(kept)
}

/// Positive test interactions whose item has every structured attribute
pub fn scorable_by_attributes(test: &[RatingRecord], index: &DataIndex) -> Vec<RatingRecord> {
    let kept: Vec<RatingRecord> = positive_interactions(test)
        .into_iter()
        .filter(|r| index.get_item(r.item_id).is_some_and(|item| item.is_complete()))
        .collect();
    info!("{} positive test interactions have complete attributes", kept.len());
    kept
}

/// Drop predictions of users that do not appear in the test split.
///
/// Remaining lines keep their order.
pub fn filter_predictions(
    predictions: &[(UserId, ItemId)],
    test: &[RatingRecord],
) -> Vec<(UserId, ItemId)> {
    let test_users: HashSet<UserId> = test.iter().map(|r| r.user_id).collect();
    predictions
        .iter()
        .filter(|(user_id, _)| test_users.contains(user_id))
        .copied()
        .collect()
}

/// Write the positive-only train file and the scorable test file of a
/// variant. Returns the `(train, test)` interaction counts.
pub fn export(paths: &DataPaths, structured: bool) -> Result<(usize, usize)> {
    let train = positive_interactions(&parser::parse_ratings(&paths.raw_split(Split::Train))?);
    let raw_test = parser::parse_ratings(&paths.raw_split(Split::Test))?;
    let test = if structured {
        let items = parser::parse_item_attributes(&paths.item_attributes())?;
        scorable_by_attributes(&raw_test, &DataIndex::from_parts(Vec::new(), items))
    } else {
        scorable_by_text(&raw_test, &ItemTexts::new(paths.raw_texts()))?
    };

    parser::write_ratings(&paths.elliot_split(structured, Split::Train), &train)?;
    parser::write_ratings(&paths.elliot_split(structured, Split::Test), &test)?;
    Ok((train.len(), test.len()))
}

/// Filter a prediction file against the exported test file of a variant.
///
/// Users without a scorable positive test interaction are dropped, since
/// the evaluator never sees them. Returns `(kept, total)` line counts.
pub fn filter_prediction_file(
    paths: &DataPaths,
    structured: bool,
    input: &Path,
    output: &Path,
) -> Result<(usize, usize)> {
    let predictions = parser::parse_predictions(input)?;
    let test = parser::parse_ratings(&paths.elliot_split(structured, Split::Test))?;

    let kept = filter_predictions(&predictions, &test);
    parser::write_predictions(output, &kept)?;
    info!("Kept {} of {} predictions", kept.len(), predictions.len());
    Ok((kept.len(), predictions.len()))
}
