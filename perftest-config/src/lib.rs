//! Configuration for IPA performance test runs
//!
//! Two documents live here: the per-invocation [`ExecutionContext`] built
//! from command-line flags, and the orchestrator settings
//! ([`PerftestConfig`]) loaded from YAML with environment overrides.

pub mod context;
pub mod domains;
pub mod error;
pub mod loader;
pub mod validation;

pub use context::{ExecutionContext, ExpectedResultType, ResultsFormat};
pub use domains::{
    dependencies::DependenciesConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    timing::{PollSettings, TimingConfig},
    workspace::WorkspaceConfig,
    PerftestConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;
