//! Lifecycle engine error types

use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

use crate::stage::Stage;

/// Lifecycle engine result type
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors raised by stages, collaborators and the registry
#[derive(Error, Debug)]
pub enum PluginError {
    /// Unknown provider or another unusable run setting
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A test-specific parameter check failed
    #[error("Invalid options: {0}")]
    Validation(String),

    #[error(transparent)]
    Config(#[from] perftest_config::ConfigError),

    #[error(transparent)]
    Provider(#[from] perftest_provider::ProviderError),

    #[error(transparent)]
    Output(#[from] perftest_output::OutputError),

    #[error(transparent)]
    Core(#[from] perftest_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A procedure that the run depends on did not complete
    #[error("Procedure '{name}' failed: {output}")]
    ProcedureFailed { name: String, output: String },

    /// A remote command required by the run returned non-zero
    #[error("Remote command on {host} failed with status {status}: {stderr}")]
    RemoteFailed {
        host: String,
        status: i32,
        stderr: String,
    },

    /// A bounded wait gave up
    #[error("Timed out after {elapsed:?} waiting for {what}")]
    Timeout { what: String, elapsed: Duration },

    /// Wraps whatever made a stage stop the run
    #[error("Stage '{stage}' failed")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<PluginError>,
    },

    #[error("Test '{name}' is already registered")]
    PluginAlreadyExists { name: String },

    #[error("Test '{name}' is not registered")]
    PluginNotFound { name: String },

    #[error("Failed to archive run artifacts: {0}")]
    Archive(String),

    /// The workload could not continue
    #[error("Workload error: {0}")]
    Workload(String),
}

impl PluginError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn workload(message: impl Into<String>) -> Self {
        Self::Workload(message.into())
    }

    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive(message.into())
    }

    pub fn procedure_failed(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self::ProcedureFailed {
            name: name.into(),
            output: output.into(),
        }
    }

    pub fn stage_failed(stage: Stage, source: PluginError) -> Self {
        Self::StageFailed {
            stage,
            source: Box::new(source),
        }
    }

    /// Stage that stopped the run, if this error came out of one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Error message followed by one `Caused by:` line per source
pub fn failure_trace(error: &(dyn StdError + 'static)) -> String {
    let mut trace = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        trace.push_str("\nCaused by: ");
        trace.push_str(&cause.to_string());
        source = cause.source();
    }
    trace
}
