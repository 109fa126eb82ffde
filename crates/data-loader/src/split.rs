//! Per-user train/dev split of the raw training ratings.
//!
//! For every user a `dev_size` fraction of their rows is sampled into the
//! dev split. Each user's sample is drawn from a generator seeded with the
//! same `seed`, so the split does not depend on user iteration order.

use crate::error::{DataLoadError, Result};
use crate::types::{RatingRecord, UserId};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::{BTreeMap, HashSet};

/// Split `ratings` into `(train, dev)`.
///
/// `train` keeps the input order minus the sampled rows; `dev` is grouped
/// by ascending user id, in sample order within a user.
pub fn train_dev_split(
    ratings: &[RatingRecord],
    dev_size: f64,
    seed: u64,
) -> Result<(Vec<RatingRecord>, Vec<RatingRecord>)> {
    if !(0.0..=1.0).contains(&dev_size) {
        return Err(DataLoadError::InvalidValue {
            field: "dev_size".to_string(),
            value: dev_size.to_string(),
        });
    }

    let mut by_user: BTreeMap<UserId, Vec<usize>> = BTreeMap::new();
    for (idx, rating) in ratings.iter().enumerate() {
        by_user.entry(rating.user_id).or_default().push(idx);
    }

    let mut dev = Vec::new();
    let mut dev_rows = HashSet::new();
    for rows in by_user.values() {
        let amount = (dev_size * rows.len() as f64).round() as usize;
        let mut rng = StdRng::seed_from_u64(seed);
        for pick in rand::seq::index::sample(&mut rng, rows.len(), amount) {
            let row = rows[pick];
            dev_rows.insert(row);
            dev.push(ratings[row]);
        }
    }

    let train = ratings
        .iter()
        .enumerate()
        .filter(|(idx, _)| !dev_rows.contains(idx))
        .map(|(_, rating)| *rating)
        .collect();

    Ok((train, dev))
}
