//! Error types for the ranking crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RankingError {
    #[error(transparent)]
    Prompt(#[from] prompting::PromptError),

    #[error(transparent)]
    Generation(#[from] ml_client::MLClientError),

    #[error(transparent)]
    Data(#[from] data_loader::DataLoadError),

    #[error("Failed to write results: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid ranking settings: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, RankingError>;
