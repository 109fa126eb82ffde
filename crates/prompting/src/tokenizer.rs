//! Tokenizer seam.
//!
//! The encoder only needs text to ids, ids to text, and a couple of
//! vocabulary lookups. `HfTokenizer` provides them from a HuggingFace
//! `tokenizer.json`; tests use the in-memory tokenizer from `test_utils`.

use crate::error::{PromptError, Result};
use std::path::Path;
use tokenizers::tokenizer::{Tokenizer, TruncationDirection, TruncationParams, TruncationStrategy};

pub type TokenId = u32;

/// Token used for padding when the tokenizer declares none
const DEFAULT_PAD_TOKEN: &str = "<pad>";

pub trait TextTokenizer: Send + Sync {
    /// Encode `text` into token ids.
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<TokenId>>;

    /// Decode token ids back into text, keeping special tokens.
    fn decode(&self, ids: &[TokenId]) -> Result<String>;

    /// Vocabulary id of a single token, if present
    fn token_to_id(&self, token: &str) -> Option<TokenId>;

    /// Id used to pad input sequences
    fn pad_id(&self) -> TokenId;
}

/// HuggingFace tokenizer with right-side truncation to `max_length`
#[derive(Clone)]
pub struct HfTokenizer {
    tokenizer: Tokenizer,
    max_length: usize,
    pad_id: TokenId,
}

impl HfTokenizer {
    /// Load a serialized `tokenizer.json`.
    pub fn from_file(path: &Path, max_length: usize) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            PromptError::Tokenizer(format!("Failed to load {}: {}", path.display(), e))
        })?;
        Self::configure(tokenizer, max_length)
    }

    /// Deserialize a tokenizer from JSON bytes.
    pub fn from_bytes(bytes: impl AsRef<[u8]>, max_length: usize) -> Result<Self> {
        let tokenizer = Tokenizer::from_bytes(bytes).map_err(|e| {
            PromptError::Tokenizer(format!("Failed to deserialize tokenizer: {}", e))
        })?;
        Self::configure(tokenizer, max_length)
    }

    fn configure(mut tokenizer: Tokenizer, max_length: usize) -> Result<Self> {
        if max_length == 0 {
            return Err(PromptError::Config("max_seq_length must be positive".to_string()));
        }

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                stride: 0,
                strategy: TruncationStrategy::OnlyFirst,
                direction: TruncationDirection::Right,
            }))
            .map_err(|e| {
                PromptError::Tokenizer(format!("Failed to configure truncation: {}", e))
            })?;
        // Batches are padded by the collator
        tokenizer.with_padding(None);

        let pad_id = tokenizer
            .get_padding()
            .map(|p| p.pad_id)
            .or_else(|| tokenizer.token_to_id(DEFAULT_PAD_TOKEN))
            .unwrap_or(0);

        Ok(Self {
            tokenizer,
            max_length,
            pad_id,
        })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl TextTokenizer for HfTokenizer {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<TokenId>> {
        let encoding = self
            .tokenizer
            .encode(text, add_special_tokens)
            .map_err(|e| PromptError::Tokenizer(format!("Failed to encode text: {}", e)))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[TokenId]) -> Result<String> {
        self.tokenizer
            .decode(ids, false)
            .map_err(|e| PromptError::Tokenizer(format!("Failed to decode ids: {}", e)))
    }

    fn token_to_id(&self, token: &str) -> Option<TokenId> {
        self.tokenizer.token_to_id(token)
    }

    fn pad_id(&self) -> TokenId {
        self.pad_id
    }
}

/// First id of `word` encoded without special tokens.
///
/// Generation scores the first decoding step, so the positive label word is
/// identified by its leading token.
pub fn leading_token_id(tokenizer: &dyn TextTokenizer, word: &str) -> Result<TokenId> {
    tokenizer
        .encode(word, false)?
        .first()
        .copied()
        .ok_or_else(|| PromptError::Tokenizer(format!("Word {:?} encodes to no tokens", word)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORD_LEVEL: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": { "<pad>": 0, "<unk>": 1, "no": 2, "yes": 3, "user": 4, "likes": 5, "books": 6 },
            "unk_token": "<unk>"
        }
    }"#;

    #[test]
    fn test_hf_tokenizer_truncates_and_pads() {
        let tokenizer = HfTokenizer::from_bytes(WORD_LEVEL, 2).unwrap();

        assert_eq!(tokenizer.encode("user likes books", false).unwrap(), vec![4, 5]);
        assert_eq!(tokenizer.pad_id(), 0);
        assert_eq!(tokenizer.token_to_id("yes"), Some(3));
    }

    #[test]
    fn test_leading_token_id() {
        let tokenizer = HfTokenizer::from_bytes(WORD_LEVEL, 8).unwrap();
        assert_eq!(leading_token_id(&tokenizer, "yes").unwrap(), 3);
        assert!(leading_token_id(&tokenizer, "").is_err());
    }

    #[test]
    fn test_zero_max_length_rejected() {
        assert!(HfTokenizer::from_bytes(WORD_LEVEL, 0).is_err());
    }
}
