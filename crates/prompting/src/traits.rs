//! Core traits for record filtering.
//!
//! Filters decide which joined records are usable as prompts before they
//! are rendered and encoded.

use crate::error::Result;
use data_loader::TrainingRecord;

/// Core trait for filtering records.
///
/// Filters take ownership of the records and return the ones they keep,
/// in their original order.
pub trait Filter: Send + Sync {
    /// Returns the name of this filter (for logging/debugging)
    fn name(&self) -> &str;

    /// Apply this filter to a set of records.
    fn apply(&self, records: Vec<TrainingRecord>) -> Result<Vec<TrainingRecord>>;
}
