//! Prompt templates and rendering.
//!
//! A template is plain text with named placeholders such as `*user_id*` or
//! `*item_text*`. Rendering substitutes every placeholder in a single pass
//! over the template, so substituted values are never scanned again even if
//! they happen to contain asterisks.
//!
//! One clause is conditional: when the user has no known genres, the whole
//! sentence fragment `User likes the book genres *user_genres*` is replaced
//! by `We don't know which genres the user likes`.

use crate::error::{PromptError, Result};
use data_loader::{PlainRecord, StructuredRecord, TrainingRecord};

/// Clause rewritten when the user's liked genres are unknown
pub const GENRES_CLAUSE: &str = "User likes the book genres *user_genres*";

/// Replacement for [`GENRES_CLAUSE`] when the user's liked genres are unknown
pub const GENRES_FALLBACK: &str = "We don't know which genres the user likes";

/// Every placeholder a template may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    UserId,
    ItemId,
    ItemText,
    UserGenres,
    ItemGenre,
    ItemAuthor,
    ItemSeries,
    ItemPublisher,
    ItemSubject,
}

impl Placeholder {
    pub const ALL: [Placeholder; 9] = [
        Placeholder::UserId,
        Placeholder::ItemId,
        Placeholder::ItemText,
        Placeholder::UserGenres,
        Placeholder::ItemGenre,
        Placeholder::ItemAuthor,
        Placeholder::ItemSeries,
        Placeholder::ItemPublisher,
        Placeholder::ItemSubject,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Placeholder::UserId => "user_id",
            Placeholder::ItemId => "item_id",
            Placeholder::ItemText => "item_text",
            Placeholder::UserGenres => "user_genres",
            Placeholder::ItemGenre => "item_genre",
            Placeholder::ItemAuthor => "item_author",
            Placeholder::ItemSeries => "item_series",
            Placeholder::ItemPublisher => "item_publisher",
            Placeholder::ItemSubject => "item_subject",
        }
    }

    /// The literal token as written in templates, e.g. `*user_id*`
    pub fn token(&self) -> String {
        format!("*{}*", self.name())
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

/// Which record type a template renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateVariant {
    /// Ids, liked genres and the book's text
    Plain,
    /// Ids, liked genres and the book's DBpedia attributes
    Structured,
}

impl TemplateVariant {
    pub fn name(&self) -> &'static str {
        match self {
            TemplateVariant::Plain => "plain",
            TemplateVariant::Structured => "structured",
        }
    }

    pub fn supports(&self, placeholder: Placeholder) -> bool {
        use Placeholder::*;
        match self {
            TemplateVariant::Plain => matches!(placeholder, UserId | ItemId | ItemText | UserGenres),
            TemplateVariant::Structured => !matches!(placeholder, ItemText),
        }
    }
}

/// Values a record contributes to a rendered prompt
pub trait PromptFields {
    const VARIANT: TemplateVariant;

    /// Value for a placeholder supported by `VARIANT`
    fn field(&self, placeholder: Placeholder) -> Option<String>;
}

impl PromptFields for PlainRecord {
    const VARIANT: TemplateVariant = TemplateVariant::Plain;

    fn field(&self, placeholder: Placeholder) -> Option<String> {
        match placeholder {
            Placeholder::UserId => Some(self.user_id.to_string()),
            Placeholder::ItemId => Some(self.item_id.to_string()),
            Placeholder::ItemText => Some(self.item_text.clone()),
            Placeholder::UserGenres => Some(self.user_genres.clone()),
            _ => None,
        }
    }
}

impl PromptFields for StructuredRecord {
    const VARIANT: TemplateVariant = TemplateVariant::Structured;

    fn field(&self, placeholder: Placeholder) -> Option<String> {
        match placeholder {
            Placeholder::UserId => Some(self.user_id.to_string()),
            Placeholder::ItemId => Some(self.item_id.to_string()),
            Placeholder::UserGenres => Some(self.user_genres.clone()),
            Placeholder::ItemGenre => Some(self.item_genre.clone()),
            Placeholder::ItemAuthor => Some(self.item_author.clone()),
            Placeholder::ItemSeries => Some(self.item_series.clone()),
            Placeholder::ItemPublisher => Some(self.item_publisher.clone()),
            Placeholder::ItemSubject => Some(self.item_subject.clone()),
            Placeholder::ItemText => None,
        }
    }
}

/// A validated prompt template bound to one record variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    text: String,
    variant: TemplateVariant,
    placeholders: Vec<Placeholder>,
}

impl Template {
    /// Validate `text` against `variant`.
    ///
    /// Any `*user_...*` or `*item_...*` token the variant cannot fill is a
    /// configuration error.
    pub fn new(text: impl Into<String>, variant: TemplateVariant) -> Result<Self> {
        let text = text.into();
        let mut placeholders = Vec::new();

        for name in placeholder_names(&text) {
            let supported = Placeholder::from_name(name).filter(|p| variant.supports(*p));
            match supported {
                Some(p) => {
                    if !placeholders.contains(&p) {
                        placeholders.push(p);
                    }
                }
                None => {
                    return Err(PromptError::UnsupportedPlaceholder {
                        placeholder: name.to_string(),
                        variant: variant.name(),
                    });
                }
            }
        }

        Ok(Self {
            text,
            variant,
            placeholders,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn variant(&self) -> TemplateVariant {
        self.variant
    }

    /// Placeholders referenced by the template, in first-use order
    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    /// Render a record of the template's variant.
    pub fn render<R: PromptFields>(&self, record: &R) -> Result<String> {
        if R::VARIANT != self.variant {
            return Err(PromptError::VariantMismatch {
                expected: self.variant.name(),
                found: R::VARIANT.name(),
            });
        }

        let user_genres = record.field(Placeholder::UserGenres).unwrap_or_default();

        // Longest-first: the fallback clause contains the genres token.
        let mut substitutions: Vec<(String, String)> = Vec::new();
        if user_genres.is_empty() {
            substitutions.push((GENRES_CLAUSE.to_string(), GENRES_FALLBACK.to_string()));
        }
        for &placeholder in &self.placeholders {
            let value = record.field(placeholder).ok_or(PromptError::UnsupportedPlaceholder {
                placeholder: placeholder.name().to_string(),
                variant: self.variant.name(),
            })?;
            substitutions.push((placeholder.token(), value));
        }

        Ok(substitute(&self.text, &substitutions))
    }

    /// Render either record variant
    pub fn render_record(&self, record: &TrainingRecord) -> Result<String> {
        match record {
            TrainingRecord::Plain(r) => self.render(r),
            TrainingRecord::Structured(r) => self.render(r),
        }
    }
}

/// Single left-to-right pass; at each position the first matching pattern wins
fn substitute(text: &str, substitutions: &[(String, String)]) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    let mut rest = text;

    'scan: while !rest.is_empty() {
        for (pattern, value) in substitutions {
            if rest.starts_with(pattern.as_str()) {
                out.push_str(value);
                rest = &rest[pattern.len()..];
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(ch) = chars.next() {
            out.push(ch);
        }
        rest = chars.as_str();
    }
    out
}

/// Whether an asterisk-delimited word addresses a user or item field.
///
/// Case and separator typos (`*Item_text*`, `*item-text*`) still count so
/// they are rejected instead of leaking into prompts.
fn looks_like_placeholder(candidate: &str) -> bool {
    if candidate.is_empty() || candidate.chars().any(char::is_whitespace) {
        return false;
    }
    let lower = candidate.to_ascii_lowercase();
    ["user_", "user-", "item_", "item-"]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Names of `*user_...*` / `*item_...*` tokens in a template
fn placeholder_names(text: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find('*') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('*') else {
            break;
        };
        let candidate = &after[..end];
        if looks_like_placeholder(candidate) {
            names.push(candidate);
            rest = &after[end + 1..];
        } else {
            // The closing asterisk may open the next token
            rest = after;
        }
    }
    names
}
