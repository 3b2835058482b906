//! The fixed stage pipeline every test runs through
//!
//! Stages run strictly in [`Stage::ALL`] order. A stage either returns the
//! results it produced, which are appended to the run's collection, or an
//! error, which stops the pipeline. Results recorded before the failing
//! stage stay in the collection.

use perftest_config::{ExecutionContext, PerftestConfig, Validatable};
use perftest_core::{ResultCollection, TestResult};
use perftest_provider::{
    CommandRunner, CommandSpec, HostTopology, Provider, ProviderSettings, ProvisioningPlan,
    RoleDescriptor, TemplateEngine,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::catalog::ProviderCatalog;
use crate::core::{StageContext, TestPlugin};
use crate::error::{PluginError, PluginResult};
use crate::inventory::{present_replicas, Inventory};
use crate::procedure::{Procedure, ProcedureRunner};
use crate::remote::{RemoteAccess, RemoteExecutor};
use crate::stage::Stage;
use crate::templates::{
    ADD_REPO_PLAYBOOK, ANSIBLE_CFG_TEMPLATE, FETCH_LOGS_PLAYBOOK, REPLICA_CONFIG_PLAYBOOK,
    SERVER_CONFIG_PLAYBOOK,
};
use crate::transport::Transport;
use crate::wait::poll_until;
use crate::workspace::{reset_dir, WorkspaceLayout};

/// DNS domain every topology is built under
pub const DOMAIN: &str = "ipa.test";

/// Background system monitoring on the server
const START_MONITORING: &str = "nohup sar -o ~/saroutput 2 >/dev/null 2>&1 &";

/// Succeeds once the monitoring output holds data
const MONITORING_FLUSHED: &str = "test -s ~/saroutput";

/// What the dispatcher needs to archive a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub archive_name: String,
    pub archive_entries: Vec<PathBuf>,
}

/// Drives one plugin through every stage.
///
/// Holds the state stages hand to each other: the selected provider, the
/// transports built from its credentials, the provisioning plan and the
/// discovered topology.
pub struct Lifecycle<'a> {
    config: &'a PerftestConfig,
    providers: &'a ProviderCatalog,
    runner: Arc<dyn CommandRunner>,
    transport: &'a dyn Transport,
    templates: TemplateEngine,
    layout: WorkspaceLayout,
    provider: Option<Box<dyn Provider>>,
    remote: Option<Arc<dyn RemoteExecutor>>,
    procedures: Option<Arc<dyn ProcedureRunner>>,
    plan: Option<ProvisioningPlan>,
    topology: Option<HostTopology>,
    inventory: Option<Inventory>,
    server_image: String,
}

impl<'a> Lifecycle<'a> {
    pub fn new(
        config: &'a PerftestConfig,
        providers: &'a ProviderCatalog,
        runner: Arc<dyn CommandRunner>,
        transport: &'a dyn Transport,
    ) -> Self {
        Self {
            config,
            providers,
            runner,
            transport,
            templates: TemplateEngine::new(),
            layout: WorkspaceLayout::from_config(&config.workspace),
            provider: None,
            remote: None,
            procedures: None,
            plan: None,
            topology: None,
            inventory: None,
            server_image: String::new(),
        }
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    /// Provider bound by the `select_provider` stage
    pub fn provider(&self) -> PluginResult<&dyn Provider> {
        self.provider.as_deref().ok_or_else(|| unavailable("provider"))
    }

    pub fn topology(&self) -> Option<&HostTopology> {
        self.topology.as_ref()
    }

    /// Run every stage, appending what each produces to `results`.
    ///
    /// The first failing stage ends the run with [`PluginError::StageFailed`].
    pub async fn run(
        &mut self,
        plugin: &mut dyn TestPlugin,
        ctx: &ExecutionContext,
        results: &mut ResultCollection,
    ) -> PluginResult<RunSummary> {
        info!(test = plugin.test(), provider = %ctx.provider, "Starting test run");

        for stage in Stage::ALL {
            let started = Instant::now();
            debug!(stage = %stage, "Entering stage");

            let produced = self
                .run_stage(stage, &mut *plugin, ctx)
                .await
                .map_err(|e| {
                    error!(stage = %stage, error = %e, "Stage failed");
                    PluginError::stage_failed(stage, e)
                })?;

            info!(
                stage = %stage,
                results = produced.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Stage completed"
            );
            results.extend(produced);
        }

        Ok(self.summary(&*plugin, ctx))
    }

    async fn run_stage(
        &mut self,
        stage: Stage,
        plugin: &mut dyn TestPlugin,
        ctx: &ExecutionContext,
    ) -> PluginResult<ResultCollection> {
        match stage {
            Stage::ValidateOptions => {
                ctx.validate()?;
                plugin.validate(ctx)?;
            }
            Stage::SelectProvider => self.select_provider(ctx)?,
            Stage::CheckRequirements => self.provider()?.check_requirements(ctx).await?,
            Stage::Cleanup => self.provider()?.cleanup(ctx).await,
            Stage::ResetSyncFolder => reset_dir(&self.layout.sync).await?,
            Stage::ResetMetadataFolder => reset_dir(&self.layout.metadata).await?,
            Stage::CloneDependencyRepo => self.clone_dependency_repo().await?,
            Stage::ProviderSetup => self.provider()?.setup(ctx).await?,
            Stage::GenerateMetadata => self.generate_metadata(&*plugin, ctx).await?,
            Stage::CreateVms => self.provider()?.create_vms(ctx).await?,
            Stage::CollectHosts => self.collect_hosts(ctx).await?,
            Stage::GenerateInventory => self.generate_inventory().await?,
            Stage::ConnectivityProbe => return self.connectivity_probe(&*plugin).await,
            Stage::ConfigureServer => self.configure_server(ctx).await?,
            Stage::ConfigureReplicas => self.configure_replicas(ctx).await?,
            Stage::InstallServer => {
                let stage = self.stage_context(ctx)?;
                let results = plugin.before_install_server(&stage).await?;
                info!("Installing IPA server");
                stage
                    .procedures
                    .run_checked(&stage.collection_playbook("install-server.yml"))
                    .await?;
                return Ok(results);
            }
            Stage::InstallReplicas => self.install_replicas(ctx).await?,
            Stage::EnableDataCollection => return self.enable_data_collection(&*plugin, ctx).await,
            Stage::Run => {
                let stage = self.stage_context(ctx)?;
                return plugin.run_workload(&stage).await;
            }
            Stage::CollectLogs => return self.collect_logs(&*plugin, ctx).await,
            Stage::PostProcessLogs => {
                let stage = self.stage_context(ctx)?;
                return plugin.post_process(&stage).await;
            }
            Stage::CheckResults => {
                let stage = self.stage_context(ctx)?;
                return plugin.check_results(&stage).await;
            }
        }
        Ok(ResultCollection::new())
    }

    fn select_provider(&mut self, ctx: &ExecutionContext) -> PluginResult<()> {
        let provider = self.providers.create(
            &ctx.provider,
            self.runner.clone(),
            ProviderSettings::from_config(self.config),
        )?;
        let access = RemoteAccess::from_provider(provider.as_ref(), ctx.private_key.as_deref());
        info!(
            provider = provider.name(),
            user = %access.user,
            key = %access.private_key.display(),
            "Provider selected"
        );

        self.remote = Some(self.transport.remote(&access));
        self.procedures = Some(self.transport.procedures(&access, &self.layout));
        self.provider = Some(provider);
        Ok(())
    }

    async fn clone_dependency_repo(&self) -> PluginResult<()> {
        let deps = &self.config.dependencies;
        let checkout = self.layout.metadata.join("ansible-freeipa");

        if checkout.exists() {
            info!(path = %checkout.display(), "ansible-freeipa already present, skipping clone");
        } else {
            info!(url = %deps.ansible_freeipa_url, tag = %deps.ansible_freeipa_tag, "Cloning ansible-freeipa");
            let clone = CommandSpec::new("git")
                .args(["clone", "--depth=1", "--branch"])
                .arg(deps.ansible_freeipa_tag.as_str())
                .arg(deps.ansible_freeipa_url.as_str())
                .arg(checkout.display().to_string());
            self.runner.run_checked(&clone).await?;
        }

        let cwd = tokio::fs::canonicalize(&self.layout.metadata).await?;
        let cfg = self.templates.render(
            "ansible.cfg",
            ANSIBLE_CFG_TEMPLATE,
            &json!({ "cwd": cwd.display().to_string() }),
        )?;
        tokio::fs::write(self.layout.ansible_cfg_path(), cfg).await?;
        Ok(())
    }

    async fn generate_metadata(
        &mut self,
        plugin: &dyn TestPlugin,
        ctx: &ExecutionContext,
    ) -> PluginResult<()> {
        let mut manifest = vec![RoleDescriptor::server(DOMAIN)];
        manifest.extend((0..ctx.replicas).map(|i| RoleDescriptor::replica(i, DOMAIN)));
        manifest.extend(plugin.generate_client_roles(ctx, DOMAIN));

        let provider = self
            .provider
            .as_deref_mut()
            .ok_or_else(|| unavailable("provider"))?;
        let plan = provider.generate_metadata(ctx, &manifest, DOMAIN).await?;
        self.server_image = ctx.server_image_label(provider.server_image());

        info!(
            requested = plan.requested(),
            description = %plan.description.display(),
            "Topology described"
        );
        self.plan = Some(plan);
        Ok(())
    }

    async fn collect_hosts(&mut self, ctx: &ExecutionContext) -> PluginResult<()> {
        let topology = self.provider()?.collect_hosts(ctx).await?;
        info!(hosts = topology.len(), "Hosts collected");
        debug!(topology = %topology, "Host addresses");
        self.topology = Some(topology);
        Ok(())
    }

    async fn generate_inventory(&mut self) -> PluginResult<()> {
        let topology = self.topology.as_ref().ok_or_else(|| unavailable("host topology"))?;
        let inventory = Inventory::render(
            &self.templates,
            topology,
            DOMAIN,
            self.provider()?.windows_admin_password(),
        )?;
        tokio::fs::write(self.layout.inventory_path(), &inventory.content).await?;
        info!(
            path = %self.layout.inventory_path().display(),
            tiers = inventory.tree.tier_count(),
            "Inventory written"
        );
        self.inventory = Some(inventory);
        Ok(())
    }

    async fn connectivity_probe(&self, plugin: &dyn TestPlugin) -> PluginResult<ResultCollection> {
        let procedures = self.procedures.as_deref().ok_or_else(|| unavailable("procedure runner"))?;
        match procedures.run(&Procedure::module("ping", "all")).await {
            Ok(outcome) if outcome.success => debug!("Every host answered ping"),
            Ok(outcome) => warn!(output = %outcome.output.trim_end(), "Some hosts did not answer ping"),
            Err(e) => warn!(error = %e, "Connectivity probe could not run"),
        }

        let provisioned = self.topology.as_ref().map_or(0, HostTopology::len);
        let requested = self.plan.as_ref().map_or(0, ProvisioningPlan::requested);

        let mut results = ResultCollection::new();
        if provisioned != requested {
            warn!(provisioned, requested, "Topology is smaller or larger than requested");
            results.add(
                TestResult::warning(
                    plugin,
                    format!(
                        "Number of hosts provisioned ({}) does not match requested amount ({})",
                        provisioned, requested
                    ),
                )
                .with_kw("provisioned", provisioned)
                .with_kw("requested", requested),
            );
        }
        Ok(results)
    }

    async fn configure_server(&self, ctx: &ExecutionContext) -> PluginResult<()> {
        let stage = self.stage_context(ctx)?;
        let server = stage.server()?;

        if let Some(repo_url) = &ctx.custom_repo_url {
            info!(repo_url = %repo_url, "Adding custom repository");
            stage
                .playbook_checked("add_custom_repo", ADD_REPO_PLAYBOOK, &json!({ "repo_url": repo_url }))
                .await?;
        }

        info!("Configuring IPA server");
        stage
            .playbook_checked(
                "server_config",
                SERVER_CONFIG_PLAYBOOK,
                &json!({
                    "server_ip": server.address,
                    "domain": DOMAIN,
                    "disable_selinux": ctx.disable_selinux,
                }),
            )
            .await?;
        Ok(())
    }

    async fn configure_replicas(&self, ctx: &ExecutionContext) -> PluginResult<()> {
        let stage = self.stage_context(ctx)?;
        let server = stage.server()?;

        for (_, name, address) in present_replicas(stage.topology) {
            info!(host = name, "Configuring replica");
            stage
                .playbook_checked(
                    &format!("{}_config", name),
                    REPLICA_CONFIG_PLAYBOOK,
                    &json!({
                        "replica_name": name,
                        "replica_ip": address,
                        "server_ip": server.address,
                        "domain": DOMAIN,
                    }),
                )
                .await?;
        }
        Ok(())
    }

    /// One tier at a time so every replica's parent is installed first
    async fn install_replicas(&self, ctx: &ExecutionContext) -> PluginResult<()> {
        let stage = self.stage_context(ctx)?;
        let inventory = self.inventory.as_ref().ok_or_else(|| unavailable("inventory"))?;

        for (tier, hosts) in inventory.tier_hosts.iter().enumerate() {
            info!(tier, replicas = hosts.len(), "Installing replica tier");
            stage
                .procedures
                .run_checked(
                    &stage
                        .collection_playbook("install-replica.yml")
                        .with_limit(Inventory::tier_group(tier)),
                )
                .await?;
        }
        Ok(())
    }

    async fn enable_data_collection(
        &self,
        plugin: &dyn TestPlugin,
        ctx: &ExecutionContext,
    ) -> PluginResult<ResultCollection> {
        let stage = self.stage_context(ctx)?;
        let mut results = ResultCollection::new();

        info!("Starting monitoring on server using SAR");
        match stage.run_on_server(START_MONITORING).await {
            Ok(output) if output.success() => {}
            Ok(output) => results.add(
                TestResult::warning(plugin, "Failed to start monitoring on server")
                    .with_kw("status", output.exit_code)
                    .with_kw("stderr", output.stderr.trim()),
            ),
            Err(e) => results.add(
                TestResult::warning(plugin, "Failed to start monitoring on server")
                    .with_kw("error", e.to_string()),
            ),
        }
        Ok(results)
    }

    async fn collect_logs(
        &self,
        plugin: &dyn TestPlugin,
        ctx: &ExecutionContext,
    ) -> PluginResult<ResultCollection> {
        let stage = self.stage_context(ctx)?;
        let timing = stage.timing;

        info!(settle = ?timing.collect_settle, "Waiting before copying logs");
        sleep(timing.collect_settle).await;

        let server = stage.server()?;
        let remote = stage.remote;
        let target = &server;
        poll_until("server monitoring output", &timing.monitoring_poll, || async move {
            let output = remote.run(target, MONITORING_FLUSHED).await?;
            Ok::<_, PluginError>(output.success())
        })
        .await?;

        info!("Copying logs into sync folder");
        for host in stage.topology.names() {
            tokio::fs::create_dir_all(self.layout.host_dir(host)).await?;
        }
        let sync_dir = tokio::fs::canonicalize(&self.layout.sync).await?;

        let mut results = ResultCollection::new();
        let fetched = stage
            .playbook(
                "fetch_logs",
                FETCH_LOGS_PLAYBOOK,
                &json!({
                    "sync_dir": sync_dir.display().to_string(),
                    "custom_logs": plugin.custom_logs(),
                }),
            )
            .await;
        match fetched {
            Ok(outcome) if outcome.success => {}
            Ok(_) => results.add(TestResult::warning(plugin, "Failed to fetch some log files")),
            Err(e) => results.add(
                TestResult::warning(plugin, "Failed to fetch log files").with_kw("error", e.to_string()),
            ),
        }
        Ok(results)
    }

    /// Read-only view handed to plugin hooks
    pub fn stage_context<'s>(&'s self, ctx: &'s ExecutionContext) -> PluginResult<StageContext<'s>> {
        Ok(StageContext {
            ctx,
            domain: DOMAIN,
            topology: self.topology.as_ref().ok_or_else(|| unavailable("host topology"))?,
            layout: &self.layout,
            timing: &self.config.timing,
            remote: self.remote.as_deref().ok_or_else(|| unavailable("remote executor"))?,
            procedures: self
                .procedures
                .as_deref()
                .ok_or_else(|| unavailable("procedure runner"))?,
            templates: &self.templates,
            server_image: &self.server_image,
        })
    }

    fn summary(&self, plugin: &dyn TestPlugin, ctx: &ExecutionContext) -> RunSummary {
        let mut archive_entries = vec![self.layout.sync.clone(), self.layout.metadata.clone()];
        if let Some(provider) = &self.provider {
            archive_entries.extend(provider.files_to_log());
        }
        RunSummary {
            archive_name: plugin.archive_name(ctx, &self.server_image),
            archive_entries,
        }
    }
}

fn unavailable(what: &str) -> PluginError {
    PluginError::workload(format!("{} is not available at this point of the run", what))
}
