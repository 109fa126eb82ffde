//! Rendered prompts to model inputs.

use crate::error::{PromptError, Result};
use crate::mapping::LabelWordMapping;
use crate::tokenizer::{TextTokenizer, TokenId};
use data_loader::Label;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One tokenized training or inference example.
///
/// `attention_mask` is all ones and as long as `input_ids`; `labels` holds
/// the target word's ids when the record carried a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedExample {
    pub input_ids: Vec<TokenId>,
    pub attention_mask: Vec<u8>,
    pub labels: Option<Vec<TokenId>>,
}

impl EncodedExample {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Tokenizes prompts and label words with a fixed maximum input length
#[derive(Clone)]
pub struct RecordEncoder {
    tokenizer: Arc<dyn TextTokenizer>,
    mapping: Option<LabelWordMapping>,
    max_length: usize,
}

impl RecordEncoder {
    pub fn new(
        tokenizer: Arc<dyn TextTokenizer>,
        mapping: Option<LabelWordMapping>,
        max_length: usize,
    ) -> Self {
        Self {
            tokenizer,
            mapping,
            max_length,
        }
    }

    pub fn tokenizer(&self) -> &Arc<dyn TextTokenizer> {
        &self.tokenizer
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Tokenize a prompt, and its label word when `label` is given.
    ///
    /// Inputs are cut from the tail to `max_length` tokens.
    pub fn encode(&self, prompt: &str, label: Option<Label>) -> Result<EncodedExample> {
        let mut input_ids = self.tokenizer.encode(prompt, true)?;
        input_ids.truncate(self.max_length);
        let attention_mask = vec![1; input_ids.len()];

        let labels = match label {
            Some(label) => {
                let mapping = self.mapping.as_ref().ok_or_else(|| {
                    PromptError::Config("labelled record but no label mapping".to_string())
                })?;
                Some(self.tokenizer.encode(mapping.word(label)?, true)?)
            }
            None => None,
        };

        Ok(EncodedExample {
            input_ids,
            attention_mask,
            labels,
        })
    }

    /// Cut `text` to at most `max_length` tokens, without special tokens.
    pub fn truncate_text(&self, text: &str) -> Result<String> {
        let mut ids = self.tokenizer.encode(text, false)?;
        ids.truncate(self.max_length);
        self.tokenizer.decode(&ids)
    }
}
