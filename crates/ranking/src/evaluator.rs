//! # Ranking Evaluator
//!
//! Scores every test candidate of a user with the generation service and
//! ranks them:
//! 1. Look up the user's candidates (test records, labels dropped)
//! 2. Render and encode them in batches of `batch_size`, in join order
//! 3. Generate for each batch and read the first-step score of the
//!    positive label token for every row
//! 4. Sort descending, keeping encounter order for ties
//!
//! The full list is returned; nothing is cut to a top-K.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use data_loader::{ItemId, TrainingRecord, UserId};
use ml_client::{GenerationBatch, GenerationParams, Generator};
use prompting::{
    DbbookProcessor, ExperimentConfig, PromptConverter, TextTokenizer, collate, leading_token_id,
};
use tracing::{debug, info, warn};

use crate::error::{RankingError, Result};

/// Items of one user with their scores, best first
pub type RankedResult = Vec<(ItemId, f32)>;

/// Candidate records grouped by user, each group in join order
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    by_user: HashMap<UserId, Vec<TrainingRecord>>,
}

impl CandidatePool {
    /// Group records by user; labels are dropped.
    pub fn from_records(records: Vec<TrainingRecord>) -> Self {
        let mut by_user: HashMap<UserId, Vec<TrainingRecord>> = HashMap::new();
        for record in records {
            by_user
                .entry(record.user_id())
                .or_default()
                .push(record.into_candidate());
        }
        Self { by_user }
    }

    /// Test-split candidates of the processor's task
    pub fn load(processor: &DbbookProcessor) -> Result<Self> {
        Ok(Self::from_records(processor.candidates()?))
    }

    /// Candidates of `user_id`; empty for unknown users
    pub fn for_user(&self, user_id: UserId) -> &[TrainingRecord] {
        self.by_user.get(&user_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }

    pub fn candidate_count(&self) -> usize {
        self.by_user.values().map(Vec::len).sum()
    }
}

/// Batch size, generation length and the scored vocabulary id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankingSettings {
    pub batch_size: usize,
    pub max_new_tokens: u32,
    pub positive_token_id: u32,
}

impl RankingSettings {
    /// Settings from the experiment config.
    ///
    /// Without an explicit `positive_token_id`, the leading token of the
    /// positive label word is scored.
    pub fn from_config(config: &ExperimentConfig, tokenizer: &dyn TextTokenizer) -> Result<Self> {
        let positive_token_id = match config.positive_token_id {
            Some(id) => id,
            None => leading_token_id(tokenizer, config.mapping.positive_word()?)?,
        };
        let settings = Self {
            batch_size: config.per_device_eval_batch_size,
            max_new_tokens: config.max_new_tokens,
            positive_token_id,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(RankingError::Settings("batch size must be positive".into()));
        }
        if self.max_new_tokens == 0 {
            return Err(RankingError::Settings("max_new_tokens must be positive".into()));
        }
        Ok(())
    }
}

/// Item scores in encounter order.
///
/// A repeated item keeps its first position and takes its latest score.
#[derive(Debug, Default)]
struct ScoreBoard {
    order: Vec<ItemId>,
    scores: HashMap<ItemId, f32>,
}

impl ScoreBoard {
    /// Record a score; returns true when the item was already present
    fn insert(&mut self, item_id: ItemId, score: f32) -> bool {
        let duplicate = self.scores.insert(item_id, score).is_some();
        if !duplicate {
            self.order.push(item_id);
        }
        duplicate
    }

    fn into_scores(self) -> Vec<(ItemId, f32)> {
        let scores = self.scores;
        self.order
            .into_iter()
            .filter_map(|item_id| scores.get(&item_id).map(|&score| (item_id, score)))
            .collect()
    }
}

/// Sort scores descending; equal scores keep their input order.
///
/// NaN scores sort last.
pub fn rank_scores(mut scores: Vec<(ItemId, f32)>) -> RankedResult {
    let key = |score: f32| if score.is_nan() { f32::NEG_INFINITY } else { score };
    scores.sort_by(|a, b| key(b.1).total_cmp(&key(a.1)));
    scores
}

/// Ranks a user's candidates with a generation service
#[derive(Clone)]
pub struct RankingEvaluator {
    generator: Arc<dyn Generator>,
    converter: PromptConverter,
    pool: Arc<CandidatePool>,
    settings: RankingSettings,
}

impl RankingEvaluator {
    pub fn new(
        generator: Arc<dyn Generator>,
        converter: PromptConverter,
        pool: Arc<CandidatePool>,
        settings: RankingSettings,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            generator,
            converter,
            pool,
            settings,
        })
    }

    pub fn pool(&self) -> &CandidatePool {
        &self.pool
    }

    pub fn settings(&self) -> &RankingSettings {
        &self.settings
    }

    /// Score and rank every candidate of `user_id`.
    ///
    /// A user without candidates gets an empty list. Any generation failure
    /// is returned unchanged.
    pub async fn rank(&self, user_id: UserId) -> Result<RankedResult> {
        let start_time = Instant::now();
        let candidates = self.pool.for_user(user_id);
        if candidates.is_empty() {
            debug!("User {} has no candidates", user_id);
            return Ok(Vec::new());
        }

        let params = GenerationParams {
            max_new_tokens: self.settings.max_new_tokens,
            output_scores: true,
        };
        let pad_id = self.converter.encoder().tokenizer().pad_id();

        let mut board = ScoreBoard::default();
        for (batch_idx, chunk) in candidates.chunks(self.settings.batch_size).enumerate() {
            let examples = chunk
                .iter()
                .map(|record| self.converter.convert(record))
                .collect::<prompting::Result<Vec<_>>>()?;
            let padded = collate(&examples, pad_id);
            let batch = GenerationBatch {
                input_ids: padded.input_ids,
                attention_mask: padded.attention_mask,
            };

            let output = self.generator.generate(&batch, &params).await?;
            for (row, record) in chunk.iter().enumerate() {
                let score = output.score_at(0, row, self.settings.positive_token_id)?;
                if board.insert(record.item_id(), score) {
                    warn!(
                        "User {} has item {} more than once; keeping the latest score",
                        user_id,
                        record.item_id()
                    );
                }
            }
            debug!(
                "User {}: scored batch {} ({} candidates)",
                user_id,
                batch_idx,
                chunk.len()
            );
        }

        let ranked = rank_scores(board.into_scores());
        info!(
            "Ranked {} items for user {} in {:.2?}",
            ranked.len(),
            user_id,
            start_time.elapsed()
        );
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::PlainRecord;
    use ml_client::{GenerationOutput, MLClientError};
    use prompting::test_utils::WordTokenizer;
    use prompting::{RecordEncoder, Template, TemplateVariant};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    // ============================================================================
    // Test Fixtures
    // ============================================================================

    const YES: u32 = 3;

    /// Hands out queued scores to rows in call order
    struct QueuedGenerator {
        scores: Mutex<VecDeque<f32>>,
        batch_sizes: Mutex<Vec<usize>>,
    }

    impl QueuedGenerator {
        fn new(scores: &[f32]) -> Self {
            Self {
                scores: Mutex::new(scores.iter().copied().collect()),
                batch_sizes: Mutex::new(Vec::new()),
            }
        }
    }

    #[ml_client::async_trait]
    impl Generator for QueuedGenerator {
        async fn generate(
            &self,
            batch: &GenerationBatch,
            _params: &GenerationParams,
        ) -> ml_client::Result<GenerationOutput> {
            self.batch_sizes.lock().unwrap().push(batch.len());
            let mut queue = self.scores.lock().unwrap();
            let rows = (0..batch.len())
                .map(|_| {
                    let mut vocab = vec![0.0; 4];
                    vocab[YES as usize] = queue.pop_front().unwrap_or(0.0);
                    vocab
                })
                .collect();
            Ok(GenerationOutput {
                sequences: vec![vec![0, YES]; batch.len()],
                scores: vec![rows],
            })
        }
    }

    struct FailingGenerator;

    #[ml_client::async_trait]
    impl Generator for FailingGenerator {
        async fn generate(
            &self,
            _batch: &GenerationBatch,
            _params: &GenerationParams,
        ) -> ml_client::Result<GenerationOutput> {
            Err(MLClientError::GenerationError("model exploded".into()))
        }
    }

    fn candidate(user_id: UserId, item_id: ItemId) -> TrainingRecord {
        TrainingRecord::Plain(PlainRecord {
            user_id,
            item_id,
            label: Some(1),
            user_genres: String::new(),
            item_genre: String::new(),
            item_text: format!("text of {}", item_id),
        })
    }

    fn converter() -> PromptConverter {
        let template = Template::new("*item_id* *item_text*", TemplateVariant::Plain).unwrap();
        let encoder = RecordEncoder::new(Arc::new(WordTokenizer::new()), None, 32);
        PromptConverter::new(template, encoder)
    }

    fn evaluator(generator: Arc<dyn Generator>, records: Vec<TrainingRecord>, batch_size: usize) -> RankingEvaluator {
        RankingEvaluator::new(
            generator,
            converter(),
            Arc::new(CandidatePool::from_records(records)),
            RankingSettings {
                batch_size,
                max_new_tokens: 3,
                positive_token_id: YES,
            },
        )
        .unwrap()
    }

    // ============================================================================
    // Unit Tests: rank_scores
    // ============================================================================

    #[test]
    fn test_rank_scores_descending_and_stable() {
        let ranked = rank_scores(vec![(10, 0.2), (11, 0.8), (12, 0.2)]);
        assert_eq!(ranked, vec![(11, 0.8), (10, 0.2), (12, 0.2)]);
    }

    #[test]
    fn test_rank_scores_nan_last() {
        let ranked = rank_scores(vec![(1, f32::NAN), (2, -3.0), (3, 0.5)]);
        let ids: Vec<ItemId> = ranked.iter().map(|r| r.0).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_rank_scores_empty() {
        assert!(rank_scores(Vec::new()).is_empty());
    }

    // ============================================================================
    // Unit Tests: RankingEvaluator
    // ============================================================================

    #[tokio::test]
    async fn test_rank_example() {
        let generator = Arc::new(QueuedGenerator::new(&[0.2, 0.8, 0.2]));
        let evaluator = evaluator(
            generator.clone(),
            vec![candidate(1, 10), candidate(1, 11), candidate(1, 12)],
            2,
        );

        let ranked = evaluator.rank(1).await.unwrap();
        assert_eq!(ranked, vec![(11, 0.8), (10, 0.2), (12, 0.2)]);
        assert_eq!(*generator.batch_sizes.lock().unwrap(), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_rank_user_without_candidates() {
        let generator = Arc::new(QueuedGenerator::new(&[]));
        let evaluator = evaluator(generator.clone(), vec![candidate(1, 10)], 8);

        assert!(evaluator.rank(99).await.unwrap().is_empty());
        assert!(generator.batch_sizes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_item_keeps_latest_score() {
        let generator = Arc::new(QueuedGenerator::new(&[0.9, 0.5, 0.1]));
        let evaluator = evaluator(
            generator,
            vec![candidate(2, 7), candidate(2, 8), candidate(2, 7)],
            8,
        );

        let ranked = evaluator.rank(2).await.unwrap();
        assert_eq!(ranked, vec![(8, 0.5), (7, 0.1)]);
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let evaluator = evaluator(Arc::new(FailingGenerator), vec![candidate(1, 10)], 8);

        let err = evaluator.rank(1).await.unwrap_err();
        assert!(matches!(err, RankingError::Generation(MLClientError::GenerationError(_))));
    }

    #[tokio::test]
    async fn test_out_of_vocabulary_token_is_invalid_response() {
        let generator = Arc::new(QueuedGenerator::new(&[0.3]));
        let evaluator = RankingEvaluator::new(
            generator,
            converter(),
            Arc::new(CandidatePool::from_records(vec![candidate(1, 10)])),
            RankingSettings {
                batch_size: 1,
                max_new_tokens: 3,
                positive_token_id: 333,
            },
        )
        .unwrap();

        let err = evaluator.rank(1).await.unwrap_err();
        assert!(matches!(err, RankingError::Generation(MLClientError::InvalidResponse(_))));
    }

    #[test]
    fn test_candidate_pool_groups_in_join_order() {
        let pool = CandidatePool::from_records(vec![
            candidate(1, 30),
            candidate(2, 5),
            candidate(1, 10),
        ]);

        let items: Vec<ItemId> = pool.for_user(1).iter().map(|r| r.item_id()).collect();
        assert_eq!(items, vec![30, 10]);
        assert!(pool.for_user(1).iter().all(|r| r.label().is_none()));
        assert_eq!(pool.user_count(), 2);
        assert_eq!(pool.candidate_count(), 3);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = RankingEvaluator::new(
            Arc::new(FailingGenerator),
            converter(),
            Arc::new(CandidatePool::default()),
            RankingSettings {
                batch_size: 0,
                max_new_tokens: 3,
                positive_token_id: YES,
            },
        );
        assert!(matches!(result, Err(RankingError::Settings(_))));
    }
}
