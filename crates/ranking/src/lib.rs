//! # Ranking Crate
//!
//! Evaluates a fine-tuned prompting model as a recommender: every test
//! candidate of a user is scored by the model's first-step score of the
//! positive label word, and the candidates are ranked by that score.
//!
//! ## Main Components
//!
//! - **evaluator**: `RankingEvaluator`, candidate pools and the score sort
//! - **run**: Whole-run iteration over test users and the results writer
//!
//! ## Example Usage
//!
//! ```ignore
//! use ranking::{CandidatePool, RankingEvaluator, RankingSettings, ResultsWriter, rank_many};
//!
//! let pool = Arc::new(CandidatePool::load(&processor)?);
//! let settings = RankingSettings::from_config(&config, tokenizer.as_ref())?;
//! let evaluator = RankingEvaluator::new(generator, converter, pool, settings)?;
//!
//! let mut writer = ResultsWriter::append(&results_path(Path::new("results"), &config.run_name())).await?;
//! rank_many(&evaluator, &test_users(&raw_test), &mut writer, 1).await?;
//! ```

pub mod error;
pub mod evaluator;
pub mod run;

pub use error::{RankingError, Result};
pub use evaluator::{CandidatePool, RankedResult, RankingEvaluator, RankingSettings, rank_scores};
pub use run::{ResultsWriter, RunSummary, rank_many, results_path, test_users};
