//! Pooled machines reserved through IdM-CI

use async_trait::async_trait;
use perftest_config::ExecutionContext;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::error::{ProviderError, ProviderResult};
use crate::settings::ProviderSettings;
use crate::topology::{HostTopology, ProvisioningPlan, RoleDescriptor, RoleKind};
use crate::traits::Provider;

const DEFAULT_IMAGE: &str = "fedora-34";
const AD_IMAGE: &str = "win-2019";
const VAULT_PASSWORD_FILE: &str = ".idmci-ansible-vault-password-file";
const METADATA_FILE: &str = "metadata.yaml";

#[derive(Debug, Serialize, PartialEq)]
struct IdmciMetadata {
    domains: Vec<IdmciDomain>,
    /// Reservation lifetime in hours
    lifetime: u32,
}

#[derive(Debug, Serialize, PartialEq)]
struct IdmciDomain {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    hosts: Vec<IdmciHost>,
}

#[derive(Debug, Serialize, PartialEq)]
struct IdmciHost {
    name: String,
    group: String,
    os: String,
}

fn host_group(kind: RoleKind) -> &'static str {
    match kind {
        RoleKind::Server => "ipalarge",
        RoleKind::Client => "ipaclient",
        RoleKind::Ad => "ad",
    }
}

/// Parse `mrack list` output.
///
/// Lines look like
/// `active fedora-34 41df92f5-... fedora34.idmci.test 10.0.199.6 None None`;
/// the short host name is the key and the fifth field the address.
pub fn parse_mrack_list(output: &str) -> ProviderResult<HostTopology> {
    let mut pairs = Vec::new();
    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match (fields.get(3), fields.get(4)) {
            (Some(fqdn), Some(address)) => {
                let name = fqdn.split('.').next().unwrap_or(fqdn);
                pairs.push((name.to_string(), address.to_string()));
            }
            _ => debug!(line, "Skipping unrecognised mrack output line"),
        }
    }
    HostTopology::from_pairs(pairs)
}

/// IdM-CI provider; needs the shared Ansible vault password
pub struct IdmciProvider {
    runner: Arc<dyn CommandRunner>,
    settings: ProviderSettings,
    server_image: String,
    client_image: String,
}

impl IdmciProvider {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: ProviderSettings) -> Self {
        Self {
            runner,
            settings,
            server_image: DEFAULT_IMAGE.to_string(),
            client_image: DEFAULT_IMAGE.to_string(),
        }
    }

    fn vault_password_file(&self) -> Option<PathBuf> {
        self.settings
            .home_dir
            .as_ref()
            .map(|home| home.join(VAULT_PASSWORD_FILE))
    }

    /// `te` phase runner from the cloned helper
    fn te(&self) -> CommandSpec {
        let mut spec = CommandSpec::new("python3")
            .arg("idm-ci/scripts/te")
            .current_dir(&self.settings.metadata_dir);
        if let Some(vault) = self.vault_password_file() {
            spec = spec.env(
                "ANSIBLE_VAULT_PASSWORD_FILE",
                vault.display().to_string(),
            );
        }
        spec
    }

    fn image_for(&self, kind: RoleKind) -> &str {
        match kind {
            RoleKind::Server => &self.server_image,
            RoleKind::Client => &self.client_image,
            RoleKind::Ad => AD_IMAGE,
        }
    }

    fn describe(
        &self,
        ctx: &ExecutionContext,
        manifest: &[RoleDescriptor],
        domain: &str,
    ) -> IdmciMetadata {
        let hosts = manifest
            .iter()
            .map(|role| IdmciHost {
                name: role.hostname.clone(),
                group: host_group(role.kind).to_string(),
                os: self.image_for(role.kind).to_string(),
            })
            .collect();

        IdmciMetadata {
            domains: vec![IdmciDomain {
                name: domain.to_lowercase(),
                kind: "ipa".to_string(),
                hosts,
            }],
            lifetime: ctx.idmci_lifetime,
        }
    }
}

#[async_trait]
impl Provider for IdmciProvider {
    fn name(&self) -> &'static str {
        "idmci"
    }

    async fn check_requirements(&self, _ctx: &ExecutionContext) -> ProviderResult<()> {
        match self.vault_password_file() {
            Some(path) if path.exists() => Ok(()),
            _ => Err(ProviderError::environment(format!(
                "Ansible Vault Password file (~/{}) is not present.",
                VAULT_PASSWORD_FILE
            ))),
        }
    }

    async fn cleanup(&self, _ctx: &ExecutionContext) {
        if !self.settings.metadata_dir.exists() {
            debug!("No metadata directory, nothing to tear down");
            return;
        }

        info!("Tearing down previous reservation");
        let spec = self.te().args(["--phase", "teardown", METADATA_FILE]);
        match self.runner.run(&spec).await {
            Ok(output) if output.success() => {}
            Ok(output) => warn!(command = %spec, status = output.status, "Teardown failed"),
            Err(e) => warn!(command = %spec, error = %e, "Teardown failed"),
        }
    }

    async fn setup(&self, _ctx: &ExecutionContext) -> ProviderResult<()> {
        tokio::fs::create_dir_all(&self.settings.metadata_dir).await?;
        let spec = CommandSpec::new("git")
            .args(["clone", "--depth=1"])
            .arg(&self.settings.idmci_url)
            .current_dir(&self.settings.metadata_dir);
        self.runner.run_checked(&spec).await?;
        Ok(())
    }

    async fn generate_metadata(
        &mut self,
        ctx: &ExecutionContext,
        manifest: &[RoleDescriptor],
        domain: &str,
    ) -> ProviderResult<ProvisioningPlan> {
        self.server_image = ctx
            .server_image
            .clone()
            .unwrap_or_else(|| DEFAULT_IMAGE.to_string());
        self.client_image = ctx
            .client_image
            .clone()
            .unwrap_or_else(|| DEFAULT_IMAGE.to_string());

        let metadata = self.describe(ctx, manifest, domain);
        let path = self.settings.metadata_dir.join(METADATA_FILE);
        tokio::fs::create_dir_all(&self.settings.metadata_dir).await?;
        tokio::fs::write(&path, serde_yaml::to_string(&metadata)?).await?;
        info!(path = %path.display(), hosts = manifest.len(), "IdM-CI metadata written");

        Ok(ProvisioningPlan {
            description: path,
            hosts: manifest.iter().map(|r| r.short_name().to_string()).collect(),
        })
    }

    async fn create_vms(&self, _ctx: &ExecutionContext) -> ProviderResult<()> {
        info!("Creating machines");
        self.runner
            .run_checked(&self.te().args(["--upto", "prep", METADATA_FILE]))
            .await?;
        Ok(())
    }

    async fn collect_hosts(&self, _ctx: &ExecutionContext) -> ProviderResult<HostTopology> {
        let spec = CommandSpec::new("mrack")
            .arg("list")
            .current_dir(&self.settings.metadata_dir);
        let output = self.runner.run_checked(&spec).await?;

        // mrack logs the listing on stderr
        let listing = if output.stderr.trim().is_empty() {
            &output.stdout
        } else {
            &output.stderr
        };
        let topology = parse_mrack_list(listing)?;
        info!(hosts = topology.len(), "Collected host addresses");
        Ok(topology)
    }

    fn default_private_key(&self) -> PathBuf {
        self.settings.metadata_dir.join("config").join("id_rsa")
    }

    fn server_image(&self) -> &str {
        &self.server_image
    }

    fn files_to_log(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    fn ssh_user(&self) -> &str {
        "root"
    }

    fn windows_admin_password(&self) -> &str {
        "Secret123"
    }
}
