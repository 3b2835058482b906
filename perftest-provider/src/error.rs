//! Provider error types

use thiserror::Error;

use crate::command::{CommandOutput, CommandSpec};

/// Provider result type
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors raised while provisioning a topology
#[derive(Error, Debug)]
pub enum ProviderError {
    /// A prerequisite credential or configuration is missing
    #[error("Environment error: {0}")]
    Environment(String),

    /// An external program ran but reported failure
    #[error("Command '{command}' failed with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    /// An external program could not be started
    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template rendering failed for {template}: {error}")]
    TemplateRender { template: String, error: String },

    #[error("Failed to serialize topology description: {0}")]
    Metadata(#[from] serde_yaml::Error),

    #[error("Ran out of IP addresses for private network")]
    AddressSpaceExhausted,

    #[error("Host '{0}' reported more than once")]
    DuplicateHost(String),
}

impl ProviderError {
    pub fn environment(message: impl Into<String>) -> Self {
        Self::Environment(message.into())
    }

    pub fn command_failed(spec: &CommandSpec, output: &CommandOutput) -> Self {
        let stderr = output.stderr.trim();
        Self::CommandFailed {
            command: spec.to_string(),
            status: output.status,
            stderr: if stderr.is_empty() {
                output.stdout.trim().to_string()
            } else {
                stderr.to_string()
            },
        }
    }
}
