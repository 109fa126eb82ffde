//! Error types for the prompting crate.

use thiserror::Error;

/// Errors raised while turning records into model inputs
#[derive(Error, Debug)]
pub enum PromptError {
    /// Template names a placeholder the record variant cannot fill
    #[error("Template placeholder *{placeholder}* is not available for {variant} records")]
    UnsupportedPlaceholder {
        placeholder: String,
        variant: &'static str,
    },

    /// Template was rendered against the wrong record variant
    #[error("Template built for {expected} records cannot render {found} records")]
    VariantMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A label has no word in the label-word mapping
    #[error("Label {0} has no word in the label mapping")]
    UnmappedLabel(u8),

    /// The label-word mapping string could not be parsed
    #[error("Invalid label mapping {input:?}: {reason}")]
    InvalidMapping { input: String, reason: String },

    /// The tokenizer failed or could not be loaded
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Dataset lookup past the end
    #[error("Index {index} out of bounds for dataset of size {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Invalid experiment configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Data(#[from] data_loader::DataLoadError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PromptError>;
