//! The fixed stage sequence of a test run

use serde::{Deserialize, Serialize};
use std::fmt;

/// One named step of a run, in execution order.
///
/// The order never changes and stages never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ValidateOptions,
    SelectProvider,
    CheckRequirements,
    Cleanup,
    ResetSyncFolder,
    ResetMetadataFolder,
    CloneDependencyRepo,
    ProviderSetup,
    GenerateMetadata,
    CreateVms,
    CollectHosts,
    GenerateInventory,
    ConnectivityProbe,
    ConfigureServer,
    ConfigureReplicas,
    InstallServer,
    InstallReplicas,
    EnableDataCollection,
    Run,
    CollectLogs,
    PostProcessLogs,
    CheckResults,
}

impl Stage {
    pub const ALL: [Stage; 22] = [
        Stage::ValidateOptions,
        Stage::SelectProvider,
        Stage::CheckRequirements,
        Stage::Cleanup,
        Stage::ResetSyncFolder,
        Stage::ResetMetadataFolder,
        Stage::CloneDependencyRepo,
        Stage::ProviderSetup,
        Stage::GenerateMetadata,
        Stage::CreateVms,
        Stage::CollectHosts,
        Stage::GenerateInventory,
        Stage::ConnectivityProbe,
        Stage::ConfigureServer,
        Stage::ConfigureReplicas,
        Stage::InstallServer,
        Stage::InstallReplicas,
        Stage::EnableDataCollection,
        Stage::Run,
        Stage::CollectLogs,
        Stage::PostProcessLogs,
        Stage::CheckResults,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::ValidateOptions => "validate_options",
            Stage::SelectProvider => "select_provider",
            Stage::CheckRequirements => "check_requirements",
            Stage::Cleanup => "cleanup",
            Stage::ResetSyncFolder => "reset_sync_folder",
            Stage::ResetMetadataFolder => "reset_metadata_folder",
            Stage::CloneDependencyRepo => "clone_dependency_repo",
            Stage::ProviderSetup => "provider_setup",
            Stage::GenerateMetadata => "generate_metadata",
            Stage::CreateVms => "create_vms",
            Stage::CollectHosts => "collect_hosts",
            Stage::GenerateInventory => "generate_inventory",
            Stage::ConnectivityProbe => "connectivity_probe",
            Stage::ConfigureServer => "configure_server",
            Stage::ConfigureReplicas => "configure_replicas",
            Stage::InstallServer => "install_server",
            Stage::InstallReplicas => "install_replicas",
            Stage::EnableDataCollection => "enable_data_collection",
            Stage::Run => "run",
            Stage::CollectLogs => "collect_logs",
            Stage::PostProcessLogs => "post_process_logs",
            Stage::CheckResults => "check_results",
        }
    }

    /// Stages that run before any resource is created
    pub fn is_preflight(&self) -> bool {
        *self <= Stage::CheckRequirements
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
