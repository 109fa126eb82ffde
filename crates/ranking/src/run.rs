//! Evaluation run: rank every test user and append the rankings to a
//! results file.
//!
//! Each line of the results file is `user_id\titem_id`, best item first
//! within a user. The file is opened in append mode and flushed after every
//! user, so a crashed run keeps the users it finished.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use data_loader::{RatingRecord, UserId};
use futures::stream::{self, StreamExt};
use prompting::progress_bar;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::info;

use crate::error::Result;
use crate::evaluator::{RankedResult, RankingEvaluator};

/// Unique users of a ratings split, in order of first appearance
pub fn test_users(ratings: &[RatingRecord]) -> Vec<UserId> {
    let mut seen = HashSet::new();
    ratings
        .iter()
        .map(|r| r.user_id)
        .filter(|user_id| seen.insert(*user_id))
        .collect()
}

/// `<dir>/<run_name>.txt`
pub fn results_path(dir: &Path, run_name: &str) -> PathBuf {
    dir.join(format!("{}.txt", run_name))
}

/// Appends per-user rankings to a results file
pub struct ResultsWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl ResultsWriter {
    /// Open `path` for appending, creating it and its directory if needed.
    pub async fn append(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one user's ranking and flush it to disk
    pub async fn write_user(&mut self, user_id: UserId, ranked: &RankedResult) -> Result<()> {
        for (item_id, _) in ranked {
            self.out
                .write_all(format!("{}\t{}\n", user_id, item_id).as_bytes())
                .await?;
        }
        self.out.flush().await?;
        Ok(())
    }
}

/// Totals of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub users: usize,
    pub ranked_items: usize,
    pub users_without_candidates: usize,
}

/// Rank `users` and append each ranking to `writer`.
///
/// Up to `concurrency` users are ranked at once; rankings are still
/// written in the order of `users`. The first error stops the run, leaving
/// the users written so far in the file.
pub async fn rank_many(
    evaluator: &RankingEvaluator,
    users: &[UserId],
    writer: &mut ResultsWriter,
    concurrency: usize,
) -> Result<RunSummary> {
    info!(
        "Ranking {} users ({} at a time) into {}",
        users.len(),
        concurrency.max(1),
        writer.path().display()
    );

    let pb = progress_bar(users.len(), "Ranking users");
    let mut rankings = stream::iter(users.iter().copied())
        .map(|user_id| async move { (user_id, evaluator.rank(user_id).await) })
        .buffered(concurrency.max(1));

    let mut summary = RunSummary::default();
    while let Some((user_id, ranked)) = rankings.next().await {
        let ranked = ranked?;
        writer.write_user(user_id, &ranked).await?;

        summary.users += 1;
        summary.ranked_items += ranked.len();
        if ranked.is_empty() {
            summary.users_without_candidates += 1;
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        "Ranked {} items for {} users ({} without candidates)",
        summary.ranked_items, summary.users, summary.users_without_candidates
    );
    Ok(summary)
}
