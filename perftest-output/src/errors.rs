//! Output error types

use thiserror::Error;

pub type OutputResult<T> = Result<T, OutputError>;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Serialization failed for format {format}: {error}")]
    Serialization { format: String, error: String },

    #[error("Failed to write results to {target}: {source}")]
    Write {
        target: String,
        #[source]
        source: std::io::Error,
    },
}

impl OutputError {
    pub fn serialization(format: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Serialization {
            format: format.into(),
            error: error.into(),
        }
    }
}
