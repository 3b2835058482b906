//! Settings shared by every provider

use perftest_config::PerftestConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Local paths and timing a provider works with
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    /// Working directory of the run
    pub root: PathBuf,
    /// Metadata directory, wiped before provisioning
    pub metadata_dir: PathBuf,
    /// Pause after restarting the virtualization daemon
    pub cleanup_settle: Duration,
    /// Reservation helper repository
    pub idmci_url: String,
    /// Used to locate credential files; `None` when it cannot be determined
    pub home_dir: Option<PathBuf>,
}

impl ProviderSettings {
    pub fn from_config(config: &PerftestConfig) -> Self {
        Self {
            root: config.workspace.root.clone(),
            metadata_dir: config.workspace.metadata_path(),
            cleanup_settle: config.timing.cleanup_settle,
            idmci_url: config.dependencies.idmci_url.clone(),
            home_dir: dirs::home_dir(),
        }
    }

    /// Expand a leading `~/` against the home directory
    pub fn expand_home(&self, path: &str) -> PathBuf {
        match (path.strip_prefix("~/"), &self.home_dir) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(path),
        }
    }
}
