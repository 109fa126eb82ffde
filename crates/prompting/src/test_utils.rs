//! Shared test utilities.
//!
//! `WordTokenizer` splits on whitespace and assigns ids on first sight, so
//! tests need no tokenizer files. Enabled for this crate's tests and, for
//! downstream crates, through the `test-utils` feature.

use crate::error::Result;
use crate::tokenizer::{TextTokenizer, TokenId};
use std::collections::HashMap;
use std::sync::RwLock;

pub const PAD_TOKEN: &str = "<pad>";
pub const EOS_TOKEN: &str = "</s>";

const PAD_ID: TokenId = 0;
const EOS_ID: TokenId = 1;
const NO_ID: TokenId = 2;
const YES_ID: TokenId = 3;

#[derive(Default)]
struct Vocab {
    ids: HashMap<String, TokenId>,
    tokens: Vec<String>,
}

impl Vocab {
    fn id(&mut self, token: &str) -> TokenId {
        if let Some(&id) = self.ids.get(token) {
            return id;
        }
        let id = self.tokens.len() as TokenId;
        self.ids.insert(token.to_string(), id);
        self.tokens.push(token.to_string());
        id
    }
}

/// Whitespace tokenizer with a growing vocabulary.
///
/// `<pad>` is 0, `</s>` is 1, `no` is 2 and `yes` is 3. Special tokens add a
/// trailing `</s>`, as T5 tokenizers do.
pub struct WordTokenizer {
    vocab: RwLock<Vocab>,
}

impl WordTokenizer {
    pub fn new() -> Self {
        let mut vocab = Vocab::default();
        for token in [PAD_TOKEN, EOS_TOKEN, "no", "yes"] {
            vocab.id(token);
        }
        debug_assert_eq!(vocab.ids["yes"], YES_ID);
        Self {
            vocab: RwLock::new(vocab),
        }
    }

    pub fn yes_id(&self) -> TokenId {
        YES_ID
    }

    pub fn no_id(&self) -> TokenId {
        NO_ID
    }
}

impl Default for WordTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextTokenizer for WordTokenizer {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<TokenId>> {
        let mut vocab = self.vocab.write().expect("vocab lock poisoned");
        let mut ids: Vec<TokenId> = text.split_whitespace().map(|w| vocab.id(w)).collect();
        if add_special_tokens {
            ids.push(EOS_ID);
        }
        Ok(ids)
    }

    fn decode(&self, ids: &[TokenId]) -> Result<String> {
        let vocab = self.vocab.read().expect("vocab lock poisoned");
        let words: Vec<&str> = ids
            .iter()
            .filter_map(|&id| vocab.tokens.get(id as usize).map(String::as_str))
            .collect();
        Ok(words.join(" "))
    }

    fn token_to_id(&self, token: &str) -> Option<TokenId> {
        self.vocab.read().expect("vocab lock poisoned").ids.get(token).copied()
    }

    fn pad_id(&self) -> TokenId {
        PAD_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_tokenizer_round_trip() {
        let tokenizer = WordTokenizer::new();
        let ids = tokenizer.encode("the cat sat", true).unwrap();

        assert_eq!(ids.len(), 4);
        assert_eq!(*ids.last().unwrap(), EOS_ID);
        assert_eq!(tokenizer.decode(&ids[..3]).unwrap(), "the cat sat");
        assert_eq!(tokenizer.token_to_id("yes"), Some(tokenizer.yes_id()));
    }
}
