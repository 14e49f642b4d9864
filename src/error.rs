use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the model collaborators
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Environment variable {0} not found")]
    MissingApiKey(String),

    #[error("Completion request failed: {0}")]
    OpenAi(#[from] async_openai::error::OpenAIError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),
}

/// Errors that abort an evaluation run
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Cannot access dataset {}: {reason}", .path.display())]
    DatasetAccess { path: PathBuf, reason: String },

    #[error("Generation failed for sample {sample_id}")]
    Generation {
        sample_id: usize,
        #[source]
        source: ClientError,
    },

    #[error("Perplexity scoring failed for sample {sample_id}")]
    Scoring {
        sample_id: usize,
        #[source]
        source: ClientError,
    },

    #[error("Cannot aggregate metrics over zero records")]
    EmptyInput,

    #[error("Failed to write {}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EvalError {
    pub(crate) fn dataset(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DatasetAccess {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, source: impl Into<std::io::Error>) -> Self {
        Self::Persistence {
            path: path.into(),
            source: source.into(),
        }
    }
}
