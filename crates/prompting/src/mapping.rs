//! Label-word mapping.
//!
//! Binary labels are verbalized as target words, e.g. `{0:'no',1:'yes'}`.
//! The mapping arrives either as that Python-literal style string or as a
//! JSON object, and is parsed by a small strict grammar: integer keys
//! (optionally quoted), quoted string values, commas, braces. Nothing is
//! evaluated.

use crate::error::{PromptError, Result};
use data_loader::Label;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Label carried by positive interactions
pub const POSITIVE_LABEL: Label = 1;

/// Label carried by negative interactions
pub const NEGATIVE_LABEL: Label = 0;

/// Total map from labels to their target words
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MappingSpec", into = "BTreeMap<String, String>")]
pub struct LabelWordMapping {
    words: BTreeMap<Label, String>,
}

/// Either form the mapping may take in a params file
#[derive(Deserialize)]
#[serde(untagged)]
enum MappingSpec {
    Literal(String),
    Object(BTreeMap<String, String>),
}

impl TryFrom<MappingSpec> for LabelWordMapping {
    type Error = PromptError;

    fn try_from(spec: MappingSpec) -> Result<Self> {
        match spec {
            MappingSpec::Literal(text) => text.parse(),
            MappingSpec::Object(entries) => {
                let mut words = BTreeMap::new();
                for (key, word) in entries {
                    let label = parse_label(&key, &key)?;
                    words.insert(label, word);
                }
                Self::from_words(words)
            }
        }
    }
}

impl From<LabelWordMapping> for BTreeMap<String, String> {
    fn from(mapping: LabelWordMapping) -> Self {
        mapping
            .words
            .into_iter()
            .map(|(label, word)| (label.to_string(), word))
            .collect()
    }
}

impl LabelWordMapping {
    pub fn from_words(words: BTreeMap<Label, String>) -> Result<Self> {
        if words.is_empty() {
            return Err(PromptError::InvalidMapping {
                input: String::new(),
                reason: "mapping has no entries".to_string(),
            });
        }
        Ok(Self { words })
    }

    /// Target word for `label`
    pub fn word(&self, label: Label) -> Result<&str> {
        self.words
            .get(&label)
            .map(String::as_str)
            .ok_or(PromptError::UnmappedLabel(label))
    }

    /// Word the ranking score is read for
    pub fn positive_word(&self) -> Result<&str> {
        self.word(POSITIVE_LABEL)
    }

    /// Fail unless every label in `labels` has a word
    pub fn ensure_covers(&self, labels: &[Label]) -> Result<()> {
        for &label in labels {
            self.word(label)?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Label, &str)> {
        self.words.iter().map(|(label, word)| (*label, word.as_str()))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl FromStr for LabelWordMapping {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self> {
        let words = MappingParser::new(s).parse()?;
        Self::from_words(words)
    }
}

impl fmt::Display for LabelWordMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (label, word)) in self.words.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}:'{}'", label, word.replace('\\', "\\\\").replace('\'', "\\'"))?;
        }
        f.write_str("}")
    }
}

fn parse_label(input: &str, key: &str) -> Result<Label> {
    key.trim().parse().map_err(|_| PromptError::InvalidMapping {
        input: input.to_string(),
        reason: format!("key {:?} is not a label", key),
    })
}

struct MappingParser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> MappingParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn error(&self, reason: impl Into<String>) -> PromptError {
        PromptError::InvalidMapping {
            input: self.input.to_string(),
            reason: reason.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        self.skip_whitespace();
        match self.chars.next() {
            Some((_, c)) if c == expected => Ok(()),
            Some((pos, c)) => Err(self.error(format!("expected '{}' at {}, found '{}'", expected, pos, c))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn parse(mut self) -> Result<BTreeMap<Label, String>> {
        let mut words = BTreeMap::new();
        self.expect('{')?;

        loop {
            self.skip_whitespace();
            if self.chars.next_if(|(_, c)| *c == '}').is_some() {
                break;
            }

            let key = self.key()?;
            let label = parse_label(self.input, &key)?;
            self.expect(':')?;
            let word = self.quoted()?;
            if words.insert(label, word).is_some() {
                return Err(self.error(format!("label {} mapped twice", label)));
            }

            self.skip_whitespace();
            match self.chars.next() {
                Some((_, ',')) => continue,
                Some((_, '}')) => break,
                Some((pos, c)) => return Err(self.error(format!("unexpected '{}' at {}", c, pos))),
                None => return Err(self.error("unterminated mapping")),
            }
        }

        self.skip_whitespace();
        if let Some((pos, _)) = self.chars.next() {
            return Err(self.error(format!("trailing input at {}", pos)));
        }
        Ok(words)
    }

    fn key(&mut self) -> Result<String> {
        self.skip_whitespace();
        match self.chars.peek() {
            Some((_, '\'' | '"')) => self.quoted(),
            Some(_) => {
                let mut key = String::new();
                while let Some((_, c)) = self.chars.next_if(|(_, c)| c.is_ascii_digit()) {
                    key.push(c);
                }
                if key.is_empty() {
                    return Err(self.error("expected an integer label"));
                }
                Ok(key)
            }
            None => Err(self.error("expected a label, found end of input")),
        }
    }

    fn quoted(&mut self) -> Result<String> {
        self.skip_whitespace();
        let quote = match self.chars.next() {
            Some((_, q @ ('\'' | '"'))) => q,
            Some((pos, c)) => return Err(self.error(format!("expected a quoted word at {}, found '{}'", pos, c))),
            None => return Err(self.error("expected a quoted word, found end of input")),
        };

        let mut word = String::new();
        loop {
            match self.chars.next() {
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, c)) => word.push(c),
                    None => return Err(self.error("dangling escape")),
                },
                Some((_, c)) if c == quote => return Ok(word),
                Some((_, c)) => word.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }
}
