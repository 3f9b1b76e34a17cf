use std::path::PathBuf;

use disctag_core::DiscTagError;
use thiserror::Error;

/// Errors raised while configuring or running a training job.
#[derive(Debug, Error)]
pub enum TrainerError {
    /// An engine operation failed.
    #[error(transparent)]
    Engine(#[from] DiscTagError),

    /// The training configuration is invalid.
    #[error("invalid trainer configuration: {0}")]
    Config(String),

    /// A corpus line could not be read as a token and a tag.
    #[error("{}:{line}: {message}", .path.display())]
    Corpus {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A token shape pattern failed to compile.
    #[error("regex compilation error: {0}")]
    Regex(#[from] regex::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TrainerError>;
