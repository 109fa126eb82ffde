//! Client for the external text generation service.
//!
//! The model lives in a separate service reached over gRPC. This crate
//! provides:
//! - The `Generator` and `FineTuner` traits the pipeline depends on
//! - Plain Rust request/response types for both capabilities
//! - `TextGeneratorClient`, the gRPC implementation of both traits
//!
//! Ranking only needs the per-step scores of generation, so
//! `GenerationOutput` exposes them as `steps x batch x vocabulary`.

use thiserror::Error;

pub mod client;
pub mod proto;

pub use client::TextGeneratorClient;
pub use tonic::async_trait;

/// Errors that can occur when interacting with the model service
#[derive(Error, Debug)]
pub enum MLClientError {
    #[error("Failed to connect to model service: {0}")]
    ConnectionError(String),

    #[error("Generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid response from model service: {0}")]
    InvalidResponse(String),

    #[error("Fine-tuning failed: {0}")]
    FineTuneError(String),
}

pub type Result<T> = std::result::Result<T, MLClientError>;

/// Padded model inputs, one row per prompt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationBatch {
    pub input_ids: Vec<Vec<u32>>,
    pub attention_mask: Vec<Vec<u8>>,
}

impl GenerationBatch {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub output_scores: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 3,
            output_scores: true,
        }
    }
}

/// Generated sequences and, when requested, per-step vocabulary scores
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOutput {
    pub sequences: Vec<Vec<u32>>,
    /// `scores[step][row][token_id]`
    pub scores: Vec<Vec<Vec<f32>>>,
}

impl GenerationOutput {
    /// Score of `token_id` for batch row `row` at decoding step `step`
    pub fn score_at(&self, step: usize, row: usize, token_id: u32) -> Result<f32> {
        let step_scores = self.scores.get(step).ok_or_else(|| {
            MLClientError::InvalidResponse(format!(
                "no scores for step {} ({} steps returned)",
                step,
                self.scores.len()
            ))
        })?;
        let row_scores = step_scores.get(row).ok_or_else(|| {
            MLClientError::InvalidResponse(format!(
                "no scores for row {} at step {} ({} rows returned)",
                row,
                step,
                step_scores.len()
            ))
        })?;
        row_scores.get(token_id as usize).copied().ok_or_else(|| {
            MLClientError::InvalidResponse(format!(
                "token id {} outside vocabulary of {} scores",
                token_id,
                row_scores.len()
            ))
        })
    }

    /// Check the output covers `batch_len` rows at every step
    pub fn validate(&self, batch_len: usize, expect_scores: bool) -> Result<()> {
        if expect_scores && self.scores.is_empty() {
            return Err(MLClientError::InvalidResponse(
                "scores were requested but none returned".into(),
            ));
        }
        for (step, rows) in self.scores.iter().enumerate() {
            if rows.len() != batch_len {
                return Err(MLClientError::InvalidResponse(format!(
                    "step {} has {} score rows for a batch of {}",
                    step,
                    rows.len(),
                    batch_len
                )));
            }
        }
        Ok(())
    }
}

/// One labelled example for fine-tuning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainingExample {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u8>,
    pub labels: Vec<u32>,
}

/// A fine-tuning request: model, data and pass-through training arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FineTuneJob {
    pub model_name_or_path: String,
    pub output_dir: String,
    pub train: Vec<TrainingExample>,
    pub eval: Vec<TrainingExample>,
    /// JSON object of training arguments
    pub training_args_json: String,
    pub seed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FineTuneReport {
    /// Checkpoint directories written by the service
    pub checkpoints: Vec<String>,
    /// JSON object of final evaluation metrics
    pub metrics_json: String,
}

/// Text generation capability used by the ranking evaluator
#[tonic::async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        batch: &GenerationBatch,
        params: &GenerationParams,
    ) -> Result<GenerationOutput>;
}

/// Fine-tuning capability
#[tonic::async_trait]
pub trait FineTuner: Send + Sync {
    async fn fine_tune(&self, job: FineTuneJob) -> Result<FineTuneReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output() -> GenerationOutput {
        GenerationOutput {
            sequences: vec![vec![0, 3], vec![0, 2]],
            scores: vec![vec![vec![0.1, 0.2, 0.3, 0.9], vec![0.4, 0.5, 0.6, -0.2]]],
        }
    }

    #[test]
    fn test_score_at() {
        let output = output();
        assert_eq!(output.score_at(0, 0, 3).unwrap(), 0.9);
        assert_eq!(output.score_at(0, 1, 3).unwrap(), -0.2);
    }

    #[test]
    fn test_score_at_out_of_range() {
        let output = output();
        assert!(matches!(output.score_at(1, 0, 3), Err(MLClientError::InvalidResponse(_))));
        assert!(matches!(output.score_at(0, 2, 3), Err(MLClientError::InvalidResponse(_))));
        assert!(matches!(output.score_at(0, 0, 4), Err(MLClientError::InvalidResponse(_))));
    }

    #[test]
    fn test_validate() {
        let output = output();
        assert!(output.validate(2, true).is_ok());
        assert!(output.validate(3, true).is_err());
        assert!(GenerationOutput::default().validate(2, true).is_err());
        assert!(GenerationOutput::default().validate(2, false).is_ok());
    }

    #[test]
    fn test_default_params() {
        let params = GenerationParams::default();
        assert_eq!(params.max_new_tokens, 3);
        assert!(params.output_scores);
    }
}
