//! Experiment parameters.
//!
//! One JSON params file describes an experiment: the model, the task, the
//! prompt template and label words, and the evaluation settings. Keys not
//! recognised here are training hyperparameters and are kept verbatim for
//! the fine-tuning service.

use crate::error::{PromptError, Result};
use crate::mapping::LabelWordMapping;
use crate::processor::{LABELS, Task};
use crate::template::Template;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_task_name() -> String {
    Task::Dbbook.as_str().to_string()
}

fn default_max_seq_length() -> usize {
    128
}

fn default_eval_batch_size() -> usize {
    8
}

fn default_max_new_tokens() -> u32 {
    3
}

fn default_seed() -> u64 {
    42
}

fn default_service_addr() -> String {
    "http://localhost:50051".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Pretrained model name or directory
    pub model_name_or_path: String,

    #[serde(default = "default_task_name")]
    pub task_name: String,

    pub template: String,

    pub mapping: LabelWordMapping,

    #[serde(default = "default_max_seq_length")]
    pub max_seq_length: usize,

    /// Encode the training split eagerly too
    #[serde(default)]
    pub always_preprocess: bool,

    #[serde(default = "default_eval_batch_size")]
    pub per_device_eval_batch_size: usize,

    /// Vocabulary id whose first-step score ranks candidates; defaults to
    /// the leading token of the positive label word
    #[serde(default)]
    pub positive_token_id: Option<u32>,

    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,

    #[serde(default)]
    pub output_dir: PathBuf,

    /// Checkpoint step evaluated by the ranking run
    #[serde(default)]
    pub checkpoint: Option<u64>,

    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_service_addr")]
    pub service_addr: String,

    /// Explicit `tokenizer.json`; defaults to the one in `model_name_or_path`
    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,

    /// Remaining training arguments, passed through to fine-tuning
    #[serde(flatten)]
    pub training_args: serde_json::Map<String, serde_json::Value>,
}

impl ExperimentConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PromptError::Config(format!("Invalid params: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check everything that can be checked without the tokenizer
    pub fn validate(&self) -> Result<()> {
        self.template()?;
        self.mapping.ensure_covers(&LABELS)?;
        if self.max_seq_length == 0 {
            return Err(PromptError::Config("max_seq_length must be positive".to_string()));
        }
        if self.per_device_eval_batch_size == 0 {
            return Err(PromptError::Config(
                "per_device_eval_batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn task(&self) -> Result<Task> {
        self.task_name.parse()
    }

    /// The template checked against the task's record variant
    pub fn template(&self) -> Result<Template> {
        Template::new(self.template.clone(), self.task()?.variant())
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.tokenizer_path
            .clone()
            .unwrap_or_else(|| Path::new(&self.model_name_or_path).join("tokenizer.json"))
    }

    /// Name results files after the output directory, e.g.
    /// `flan-t5-base-dbbook-prompt-4`
    pub fn run_name(&self) -> String {
        self.output_dir
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(self.task_name.as_str())
            .to_string()
    }

    /// Model checkpoint evaluated by the ranking run
    pub fn checkpoint_dir(&self) -> PathBuf {
        match self.checkpoint {
            Some(step) => self.output_dir.join(format!("checkpoint-{}", step)),
            None => self.output_dir.clone(),
        }
    }
}
