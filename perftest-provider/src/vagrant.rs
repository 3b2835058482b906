//! Local libvirt machines driven by Vagrant

use async_trait::async_trait;
use perftest_config::ExecutionContext;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::error::{ProviderError, ProviderResult};
use crate::ip::PrivateIpAllocator;
use crate::settings::ProviderSettings;
use crate::templates::{TemplateEngine, VAGRANTFILE_TEMPLATE};
use crate::topology::{HostTopology, ProvisioningPlan, RoleDescriptor, RoleKind};
use crate::traits::Provider;

const DEFAULT_IMAGE: &str = "fedora/38-cloud-base";
const AD_IMAGE: &str = "peru/windows-server-2019-standard-x64-eval";
const INSECURE_KEY: &str = "~/.vagrant.d/insecure_private_key";
const SSH_CONFIG_FILE: &str = "vagrant-ssh-config";

#[derive(Debug, Serialize)]
struct MachineConfig {
    name: String,
    hostname: String,
    memory: u32,
    cpus: u32,
    #[serde(rename = "box")]
    image: String,
    ip: String,
    winrm: bool,
}

#[derive(Debug, Serialize)]
struct VagrantfileData<'a> {
    private_key: Option<String>,
    machines: &'a [MachineConfig],
}

/// Memory in MiB and CPU count per role
fn sizing(kind: RoleKind) -> (u32, u32) {
    match kind {
        RoleKind::Server | RoleKind::Ad => (8192, 4),
        RoleKind::Client => (2048, 1),
    }
}

/// Vagrant/libvirt provider; the Vagrantfile lives in the workspace root
pub struct VagrantProvider {
    runner: Arc<dyn CommandRunner>,
    settings: ProviderSettings,
    templates: TemplateEngine,
    server_image: String,
    client_image: String,
}

impl VagrantProvider {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: ProviderSettings) -> Self {
        Self {
            runner,
            settings,
            templates: TemplateEngine::new(),
            server_image: DEFAULT_IMAGE.to_string(),
            client_image: DEFAULT_IMAGE.to_string(),
        }
    }

    fn vagrantfile(&self) -> PathBuf {
        self.settings.root.join("Vagrantfile")
    }

    fn vagrant(&self) -> CommandSpec {
        CommandSpec::new("vagrant").current_dir(&self.settings.root)
    }

    fn image_for(&self, kind: RoleKind) -> &str {
        match kind {
            RoleKind::Server => &self.server_image,
            RoleKind::Client => &self.client_image,
            RoleKind::Ad => AD_IMAGE,
        }
    }

    /// Render the Vagrantfile for `manifest`
    pub fn render_vagrantfile(
        &self,
        ctx: &ExecutionContext,
        manifest: &[RoleDescriptor],
    ) -> ProviderResult<String> {
        let mut ips = PrivateIpAllocator::new();
        let mut machines = Vec::with_capacity(manifest.len());
        for role in manifest {
            let (memory, cpus) = sizing(role.kind);
            machines.push(MachineConfig {
                name: role.short_name().to_string(),
                hostname: role.hostname.clone(),
                memory,
                cpus,
                image: self.image_for(role.kind).to_string(),
                ip: ips.next_ip()?,
                winrm: role.kind == RoleKind::Ad,
            });
        }

        let data = VagrantfileData {
            private_key: ctx
                .private_key
                .as_ref()
                .map(|key| key.display().to_string()),
            machines: &machines,
        };
        self.templates.render("Vagrantfile", VAGRANTFILE_TEMPLATE, &data)
    }
}

/// Parse `vagrant ssh-config` output into a topology.
///
/// Accepts the full output as well as the `grep -i HostName -B 1` form
/// where host blocks are separated by `--`.
pub fn parse_ssh_config(output: &str) -> ProviderResult<HostTopology> {
    let mut pairs = Vec::new();
    let mut current: Option<&str> = None;

    for line in output.lines() {
        let line = line.trim();
        let Some((key, value)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let value = value.trim();
        if key.eq_ignore_ascii_case("Host") {
            current = Some(value);
        } else if key.eq_ignore_ascii_case("HostName") {
            match current.take() {
                Some(name) => pairs.push((name.to_string(), value.to_string())),
                None => debug!(address = value, "HostName without a Host entry, skipping"),
            }
        }
    }

    HostTopology::from_pairs(pairs)
}

#[async_trait]
impl Provider for VagrantProvider {
    fn name(&self) -> &'static str {
        "vagrant"
    }

    async fn check_requirements(&self, ctx: &ExecutionContext) -> ProviderResult<()> {
        if let Some(key) = &ctx.private_key {
            if !key.exists() {
                return Err(ProviderError::environment(format!(
                    "Private key {} does not exist",
                    key.display()
                )));
            }
        }
        Ok(())
    }

    async fn cleanup(&self, _ctx: &ExecutionContext) {
        if !self.vagrantfile().exists() {
            debug!("No Vagrantfile, nothing to destroy");
            return;
        }

        info!("Destroying previous VMs");
        let steps = [
            self.vagrant().args(["destroy", "-f"]),
            CommandSpec::new("systemctl").args(["restart", "libvirtd"]),
        ];
        for step in &steps {
            match self.runner.run(step).await {
                Ok(output) if output.success() => {}
                Ok(output) => warn!(command = %step, status = output.status, "Cleanup step failed"),
                Err(e) => warn!(command = %step, error = %e, "Cleanup step failed"),
            }
        }

        tokio::time::sleep(self.settings.cleanup_settle).await;
    }

    async fn generate_metadata(
        &mut self,
        ctx: &ExecutionContext,
        manifest: &[RoleDescriptor],
        _domain: &str,
    ) -> ProviderResult<ProvisioningPlan> {
        self.server_image = ctx
            .server_image
            .clone()
            .unwrap_or_else(|| DEFAULT_IMAGE.to_string());
        self.client_image = ctx
            .client_image
            .clone()
            .unwrap_or_else(|| DEFAULT_IMAGE.to_string());

        let contents = self.render_vagrantfile(ctx, manifest)?;
        let path = self.vagrantfile();
        tokio::fs::write(&path, contents).await?;
        info!(path = %path.display(), machines = manifest.len(), "Vagrantfile written");

        Ok(ProvisioningPlan {
            description: path,
            hosts: manifest.iter().map(|r| r.short_name().to_string()).collect(),
        })
    }

    async fn create_vms(&self, _ctx: &ExecutionContext) -> ProviderResult<()> {
        info!("Creating VMs");
        self.runner
            .run_checked(&self.vagrant().args(["up", "--parallel"]))
            .await?;
        Ok(())
    }

    async fn collect_hosts(&self, _ctx: &ExecutionContext) -> ProviderResult<HostTopology> {
        let output = self
            .runner
            .run_checked(&self.vagrant().arg("ssh-config"))
            .await?;

        // Remote execution connects through this file
        tokio::fs::create_dir_all(&self.settings.metadata_dir).await?;
        tokio::fs::write(
            self.settings.metadata_dir.join(SSH_CONFIG_FILE),
            &output.stdout,
        )
        .await?;

        let topology = parse_ssh_config(&output.stdout)?;
        info!(hosts = topology.len(), "Collected host addresses");
        Ok(topology)
    }

    fn default_private_key(&self) -> PathBuf {
        self.settings.expand_home(INSECURE_KEY)
    }

    fn server_image(&self) -> &str {
        &self.server_image
    }

    fn files_to_log(&self) -> Vec<PathBuf> {
        vec![self.vagrantfile()]
    }

    fn ssh_user(&self) -> &str {
        "vagrant"
    }

    fn ssh_config(&self) -> Option<PathBuf> {
        Some(self.settings.metadata_dir.join(SSH_CONFIG_FILE))
    }

    fn windows_admin_password(&self) -> &str {
        "vagrant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<String>>,
        stdout: String,
        status: i32,
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, spec: &CommandSpec) -> ProviderResult<CommandOutput> {
            self.calls.lock().unwrap().push(spec.to_string());
            Ok(CommandOutput {
                status: self.status,
                stdout: self.stdout.clone(),
                stderr: String::new(),
            })
        }
    }

    fn settings(root: &std::path::Path) -> ProviderSettings {
        ProviderSettings {
            root: root.to_path_buf(),
            metadata_dir: root.join("runner_metadata"),
            cleanup_settle: Duration::ZERO,
            idmci_url: String::new(),
            home_dir: Some(PathBuf::from("/home/tester")),
        }
    }

    fn manifest() -> Vec<RoleDescriptor> {
        vec![
            RoleDescriptor::server("ipa.test"),
            RoleDescriptor::replica(0, "ipa.test"),
            RoleDescriptor::client("client000", "ipa.test"),
            RoleDescriptor::ad("ipa.test"),
        ]
    }

    #[test]
    fn test_parse_grep_form() {
        let output = "Host server\n  HostName 192.168.3.2\n--\nHost client000\n  HostName 192.168.3.3\n";
        let topology = parse_ssh_config(output).unwrap();
        assert_eq!(topology.address("server"), Some("192.168.3.2"));
        assert_eq!(topology.address("client000"), Some("192.168.3.3"));
        assert_eq!(topology.len(), 2);
    }

    #[test]
    fn test_parse_full_ssh_config() {
        let output = r#"Host server
  HostName 192.168.121.10
  User vagrant
  Port 22
  IdentityFile /home/tester/.vagrant.d/insecure_private_key

Host replica0
  HostName 192.168.121.11
  User vagrant
"#;
        let topology = parse_ssh_config(output).unwrap();
        assert_eq!(topology.address("replica0"), Some("192.168.121.11"));
        assert_eq!(topology.len(), 2);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_ssh_config("").unwrap().is_empty());
    }

    #[test]
    fn test_render_sizes_and_addresses() {
        let dir = tempfile::tempdir().unwrap();
        let provider = VagrantProvider::new(Arc::new(RecordingRunner::default()), settings(dir.path()));
        let rendered = provider
            .render_vagrantfile(&ExecutionContext::default(), &manifest())
            .unwrap();

        assert!(rendered.contains("config.vm.define :server do |server|"));
        assert!(rendered.contains(r#"server.vm.hostname = "server.ipa.test""#));
        assert!(rendered.contains(r#"ip: "192.168.3.2""#));
        assert!(rendered.contains(r#"ip: "192.168.3.5""#));
        assert!(rendered.contains("client000.vm.box = \"fedora/38-cloud-base\""));
        assert!(rendered.contains("v.memory = 2048"));
        assert!(rendered.contains(&format!("ad.vm.box = \"{}\"", AD_IMAGE)));
        assert!(rendered.contains("ad.vm.communicator = \"winrm\""));
        assert!(!rendered.contains("server.vm.communicator"));
        assert!(!rendered.contains("insert_key"));
    }

    #[test]
    fn test_render_private_key() {
        let dir = tempfile::tempdir().unwrap();
        let provider = VagrantProvider::new(Arc::new(RecordingRunner::default()), settings(dir.path()));
        let ctx = ExecutionContext {
            private_key: Some(PathBuf::from("/keys/id_perf")),
            ..Default::default()
        };
        let rendered = provider.render_vagrantfile(&ctx, &manifest()).unwrap();
        assert!(rendered.contains("config.ssh.insert_key = false"));
        assert!(rendered.contains(r#""~/.vagrant.d/insecure_private_key", "/keys/id_perf""#));
    }

    #[tokio::test]
    async fn test_generate_metadata_writes_vagrantfile() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider =
            VagrantProvider::new(Arc::new(RecordingRunner::default()), settings(dir.path()));
        let ctx = ExecutionContext {
            server_image: Some("custom/server".to_string()),
            ..Default::default()
        };
        let plan = provider
            .generate_metadata(&ctx, &manifest(), "ipa.test")
            .await
            .unwrap();

        assert_eq!(plan.requested(), 4);
        assert_eq!(plan.hosts[0], "server");
        assert!(plan.description.exists());
        assert_eq!(provider.server_image(), "custom/server");
        assert_eq!(provider.files_to_log(), vec![dir.path().join("Vagrantfile")]);
    }

    #[tokio::test]
    async fn test_cleanup_skipped_without_vagrantfile() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let provider = VagrantProvider::new(runner.clone(), settings(dir.path()));
        provider.cleanup(&ExecutionContext::default()).await;
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_ignores_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Vagrantfile"), "").unwrap();
        let runner = Arc::new(RecordingRunner {
            status: 1,
            ..Default::default()
        });
        let provider = VagrantProvider::new(runner.clone(), settings(dir.path()));
        provider.cleanup(&ExecutionContext::default()).await;
        assert_eq!(
            *runner.calls.lock().unwrap(),
            vec!["vagrant destroy -f", "systemctl restart libvirtd"]
        );
    }

    #[tokio::test]
    async fn test_create_vms_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner {
            status: 1,
            ..Default::default()
        });
        let provider = VagrantProvider::new(runner, settings(dir.path()));
        assert!(provider.create_vms(&ExecutionContext::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_collect_hosts_saves_ssh_config() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner {
            stdout: "Host server\n  HostName 192.168.3.2\n".to_string(),
            ..Default::default()
        });
        let provider = VagrantProvider::new(runner, settings(dir.path()));
        let topology = provider
            .collect_hosts(&ExecutionContext::default())
            .await
            .unwrap();
        assert_eq!(topology.server_address(), Some("192.168.3.2"));

        let saved = provider.ssh_config().unwrap();
        assert!(std::fs::read_to_string(saved).unwrap().contains("HostName"));
    }

    #[tokio::test]
    async fn test_missing_private_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let provider = VagrantProvider::new(Arc::new(RecordingRunner::default()), settings(dir.path()));
        let ctx = ExecutionContext {
            private_key: Some(dir.path().join("absent")),
            ..Default::default()
        };
        assert!(provider.check_requirements(&ctx).await.is_err());
        assert_eq!(
            provider.default_private_key(),
            PathBuf::from("/home/tester/.vagrant.d/insecure_private_key")
        );
    }
}
