//! The provider capability set

use async_trait::async_trait;
use perftest_config::ExecutionContext;
use std::path::PathBuf;

use crate::error::ProviderResult;
use crate::topology::{HostTopology, ProvisioningPlan, RoleDescriptor};

/// Backend that realizes a topology on some infrastructure.
///
/// Stale topologies are torn down by [`Provider::cleanup`] at the start of
/// the next run, never at the end of the current one, so a failed run can
/// be inspected.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Fail fast when credentials or configuration are missing
    async fn check_requirements(&self, ctx: &ExecutionContext) -> ProviderResult<()>;

    /// Best-effort teardown of a previous run; failures are only logged
    async fn cleanup(&self, ctx: &ExecutionContext);

    /// Provider-specific staging before the topology is described
    async fn setup(&self, _ctx: &ExecutionContext) -> ProviderResult<()> {
        Ok(())
    }

    /// Write the native topology description for `manifest`
    async fn generate_metadata(
        &mut self,
        ctx: &ExecutionContext,
        manifest: &[RoleDescriptor],
        domain: &str,
    ) -> ProviderResult<ProvisioningPlan>;

    /// Bring the described hosts up; no automatic retry
    async fn create_vms(&self, ctx: &ExecutionContext) -> ProviderResult<()>;

    /// Discover addresses of the hosts that came up.
    ///
    /// Hosts that failed to appear are simply absent.
    async fn collect_hosts(&self, ctx: &ExecutionContext) -> ProviderResult<HostTopology>;

    /// Key used for remote execution
    fn default_private_key(&self) -> PathBuf;

    /// Image label used in archive names
    fn server_image(&self) -> &str;

    /// Extra files archived with the run artifacts
    fn files_to_log(&self) -> Vec<PathBuf>;

    /// Remote login user
    fn ssh_user(&self) -> &str;

    /// ssh client configuration to use instead of key and user, if any
    fn ssh_config(&self) -> Option<PathBuf> {
        None
    }

    fn windows_admin_password(&self) -> &str;
}
