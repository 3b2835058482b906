//! The test plugin interface and the context handed to its stages

use async_trait::async_trait;
use perftest_config::{ExecutionContext, TimingConfig};
use perftest_core::{Producer, ResultCollection};
use perftest_provider::{HostRole, HostTopology, RoleDescriptor, TemplateEngine};
use serde::Serialize;

use crate::archive::timestamp;
use crate::error::{PluginError, PluginResult};
use crate::procedure::{Procedure, ProcedureOutcome, ProcedureRunner};
use crate::remote::{RemoteExecutor, RemoteOutput, RemoteTarget};
use crate::threshold::evaluate_threshold;
use crate::workspace::WorkspaceLayout;

/// What a workload measured, compared against the expected threshold
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurement {
    pub execution_time_secs: f64,
    /// Work items the time is spread over (clients, commands, requests)
    pub units: u64,
    pub errors: u64,
}

/// Everything a stage may read once the topology exists.
///
/// Nothing here can change the topology.
pub struct StageContext<'a> {
    pub ctx: &'a ExecutionContext,
    pub domain: &'a str,
    pub topology: &'a HostTopology,
    pub layout: &'a WorkspaceLayout,
    pub timing: &'a TimingConfig,
    pub remote: &'a dyn RemoteExecutor,
    pub procedures: &'a dyn ProcedureRunner,
    pub templates: &'a TemplateEngine,
    /// Image label for archive names
    pub server_image: &'a str,
}

impl StageContext<'_> {
    pub fn server(&self) -> PluginResult<RemoteTarget> {
        self.topology
            .server_address()
            .map(|address| RemoteTarget::new("server", address))
            .ok_or_else(|| PluginError::workload("no server host in topology"))
    }

    /// Hosts classified as `role`, ordered by name
    pub fn targets(&self, role: HostRole) -> Vec<RemoteTarget> {
        self.topology
            .with_role(role)
            .map(|(name, address)| RemoteTarget::new(name, address))
            .collect()
    }

    pub fn clients(&self) -> Vec<RemoteTarget> {
        self.targets(HostRole::Client)
    }

    /// Hosts that are neither clients nor the trust peer
    pub fn ipa_host_count(&self) -> usize {
        self.topology.count(HostRole::Server) + self.topology.count(HostRole::Replica)
    }

    pub fn fqdn(&self, name: &str) -> String {
        format!("{}.{}", name, self.domain).to_lowercase()
    }

    pub async fn run_on_server(&self, command: &str) -> PluginResult<RemoteOutput> {
        let server = self.server()?;
        self.remote.run(&server, command).await
    }

    /// Render a playbook into the metadata directory and return its procedure
    pub async fn write_playbook<T: Serialize + Sync>(
        &self,
        name: &str,
        template: &str,
        data: &T,
    ) -> PluginResult<Procedure> {
        let content = self.templates.render(name, template, data)?;
        let path = self.layout.playbook_path(name);
        tokio::fs::write(&path, content).await?;
        Ok(Procedure::playbook(name, path))
    }

    /// Render and run a playbook; failure is reported, not raised
    pub async fn playbook<T: Serialize + Sync>(
        &self,
        name: &str,
        template: &str,
        data: &T,
    ) -> PluginResult<ProcedureOutcome> {
        let procedure = self.write_playbook(name, template, data).await?;
        self.procedures.run(&procedure).await
    }

    /// Render and run a playbook the run cannot continue without
    pub async fn playbook_checked<T: Serialize + Sync>(
        &self,
        name: &str,
        template: &str,
        data: &T,
    ) -> PluginResult<ProcedureOutcome> {
        let procedure = self.write_playbook(name, template, data).await?;
        self.procedures.run_checked(&procedure).await
    }

    /// Playbook shipped with the cloned automation collection
    pub fn collection_playbook(&self, file: &str) -> Procedure {
        let name = file.trim_end_matches(".yml");
        Procedure::playbook(
            name,
            self.layout
                .metadata
                .join("ansible-freeipa/playbooks")
                .join(file),
        )
    }
}

/// One registered test type.
///
/// Every hook except [`TestPlugin::run_workload`] has a default; the
/// lifecycle engine calls them in its fixed stage order. Results a hook
/// returns are appended in the order given. Returning an error stops the
/// run.
#[async_trait]
pub trait TestPlugin: Producer + Send + Sync {
    /// Extra remote files fetched from every client during log collection
    fn custom_logs(&self) -> Vec<String> {
        Vec::new()
    }

    /// Test-specific parameter checks, before anything is touched
    fn validate(&self, _ctx: &ExecutionContext) -> PluginResult<()> {
        Ok(())
    }

    /// Client and trust-peer roles spliced after the server and replicas
    fn generate_client_roles(&self, _ctx: &ExecutionContext, _domain: &str) -> Vec<RoleDescriptor> {
        Vec::new()
    }

    /// Runs right before the IPA server is installed
    async fn before_install_server(&mut self, _stage: &StageContext<'_>) -> PluginResult<ResultCollection> {
        Ok(ResultCollection::new())
    }

    /// The workload itself
    async fn run_workload(&mut self, stage: &StageContext<'_>) -> PluginResult<ResultCollection>;

    /// Turn fetched logs into results
    async fn post_process(&mut self, _stage: &StageContext<'_>) -> PluginResult<ResultCollection> {
        Ok(ResultCollection::new())
    }

    /// Compare the measurement with the requested threshold
    async fn check_results(&mut self, stage: &StageContext<'_>) -> PluginResult<ResultCollection> {
        Ok(evaluate_threshold(&*self, stage.ctx, self.measurement()))
    }

    /// Set by the workload, `None` when nothing was measured
    fn measurement(&self) -> Option<Measurement> {
        None
    }

    /// Base name of the run archive, without extension
    fn archive_name(&self, _ctx: &ExecutionContext, server_image: &str) -> String {
        format!("{}-{}-{}", self.test(), timestamp(), server_image)
    }
}
