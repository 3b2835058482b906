//! Domain-specific configuration modules

pub mod dependencies;
pub mod logging;
pub mod timing;
pub mod utils;
pub mod workspace;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Orchestrator settings combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PerftestConfig {
    /// Logging configuration
    pub logging: logging::LoggingConfig,

    /// Local directories used while a run is in progress
    pub workspace: workspace::WorkspaceConfig,

    /// Settle delays and polling bounds
    pub timing: timing::TimingConfig,

    /// External automation repositories
    pub dependencies: dependencies::DependenciesConfig,
}

impl PerftestConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.logging.validate()?;
        self.workspace.validate()?;
        self.timing.validate()?;
        self.dependencies.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        serde_yaml::to_string(&PerftestConfig::default())
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
