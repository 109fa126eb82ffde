//! Prompt construction for book recommendation.
//!
//! This crate provides:
//! - Template rendering with placeholder substitution
//! - Label-word mapping and record encoding behind a tokenizer trait
//! - Filter trait and implementations for record filtering
//! - Eager and lazy datasets of encoded prompts, plus batch collation
//! - The JSON experiment configuration
//!
//! ## Architecture
//! Records flow through the crate in stages:
//! 1. `DbbookProcessor` loads a split and filters unusable records
//! 2. `Template` renders each record into a prompt
//! 3. `RecordEncoder` tokenizes the prompt and its label word
//! 4. `collate` pads examples into batches for the model service
//!
//! ## Example Usage
//! ```ignore
//! use prompting::{DbbookProcessor, ExperimentConfig, HfTokenizer, PromptConverter, RecordEncoder};
//!
//! let config = ExperimentConfig::from_file(Path::new("params/dbbook.json"))?;
//! let tokenizer = Arc::new(HfTokenizer::from_file(&config.tokenizer_path(), config.max_seq_length)?);
//! let encoder = RecordEncoder::new(tokenizer, Some(config.mapping.clone()), config.max_seq_length);
//! let converter = PromptConverter::new(config.template()?, encoder);
//!
//! let processor = DbbookProcessor::new(paths, config.task()?)?;
//! let dataset = build_dataset(processor.examples(Split::Dev)?, converter, Materialization::Eager)?;
//! ```

pub mod collate;
pub mod config;
pub mod dataset;
pub mod encoder;
pub mod error;
pub mod filter_pipeline;
pub mod filters;
pub mod mapping;
pub mod processor;
pub mod progress;
pub mod template;
pub mod tokenizer;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export main types
pub use collate::{Batch, LABEL_PAD_ID, collate};
pub use config::ExperimentConfig;
pub use dataset::{
    EagerDataset, LazyDataset, Materialization, PromptConverter, PromptDataset, TruncateDataset,
    build_dataset, encode_all,
};
pub use encoder::{EncodedExample, RecordEncoder};
pub use error::{PromptError, Result};
pub use filter_pipeline::FilterPipeline;
pub use mapping::{LabelWordMapping, NEGATIVE_LABEL, POSITIVE_LABEL};
pub use processor::{DbbookProcessor, LABELS, Task, load_plain_records, load_structured_records};
pub use progress::progress_bar;
pub use template::{GENRES_CLAUSE, GENRES_FALLBACK, Placeholder, Template, TemplateVariant};
pub use tokenizer::{HfTokenizer, TextTokenizer, TokenId, leading_token_id};
pub use traits::Filter;
