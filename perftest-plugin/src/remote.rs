//! Remote command execution on provisioned hosts

use async_trait::async_trait;
use perftest_provider::{CommandRunner, CommandSpec, Provider};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{PluginError, PluginResult};

/// A provisioned host
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteTarget {
    /// Short host name, also the topology key
    pub name: String,
    pub address: String,
}

impl RemoteTarget {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Captured outcome of one remote command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RemoteOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Trimmed standard output
    pub fn text(&self) -> &str {
        self.stdout.trim()
    }
}

/// Credentials used to reach provisioned hosts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAccess {
    pub user: String,
    pub private_key: PathBuf,
    /// ssh client configuration with one `Host` entry per host name
    pub ssh_config: Option<PathBuf>,
    pub windows_password: String,
}

impl RemoteAccess {
    /// Access details advertised by `provider`, with an optional key override
    pub fn from_provider(provider: &dyn Provider, key_override: Option<&Path>) -> Self {
        Self {
            user: provider.ssh_user().to_string(),
            private_key: key_override
                .map(Path::to_path_buf)
                .unwrap_or_else(|| provider.default_private_key()),
            ssh_config: provider.ssh_config(),
            windows_password: provider.windows_admin_password().to_string(),
        }
    }
}

/// Runs commands on provisioned hosts.
///
/// Calls block until the remote command exits; there is no cancellation.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn run(&self, target: &RemoteTarget, command: &str) -> PluginResult<RemoteOutput>;

    /// Copy a local file to `remote` on the target
    async fn upload(&self, target: &RemoteTarget, local: &Path, remote: &str)
        -> PluginResult<()>;

    /// Run and turn a non-zero exit into an error
    async fn run_checked(&self, target: &RemoteTarget, command: &str) -> PluginResult<RemoteOutput> {
        let output = self.run(target, command).await?;
        if !output.success() {
            return Err(PluginError::RemoteFailed {
                host: target.name.clone(),
                status: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

const SSH_OPTIONS: [&str; 6] = [
    "-o",
    "StrictHostKeyChecking=no",
    "-o",
    "UserKnownHostsFile=/dev/null",
    "-o",
    "LogLevel=ERROR",
];

/// `ssh`/`scp` through the local command runner
pub struct SshExecutor {
    runner: Arc<dyn CommandRunner>,
    access: RemoteAccess,
}

impl SshExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>, access: RemoteAccess) -> Self {
        Self { runner, access }
    }

    /// Connection arguments and the destination to use for `target`
    fn connection(&self, target: &RemoteTarget) -> (Vec<String>, String) {
        match &self.access.ssh_config {
            Some(config) => (
                vec!["-F".to_string(), config.display().to_string()],
                target.name.clone(),
            ),
            None => {
                let mut args: Vec<String> = SSH_OPTIONS.iter().map(|s| s.to_string()).collect();
                args.push("-i".to_string());
                args.push(self.access.private_key.display().to_string());
                (args, format!("{}@{}", self.access.user, target.address))
            }
        }
    }

    pub fn ssh_command(&self, target: &RemoteTarget, command: &str) -> CommandSpec {
        let (args, destination) = self.connection(target);
        CommandSpec::new("ssh")
            .args(args)
            .arg(destination)
            .arg(command)
    }

    pub fn scp_command(&self, target: &RemoteTarget, local: &Path, remote: &str) -> CommandSpec {
        let (args, destination) = self.connection(target);
        CommandSpec::new("scp")
            .args(args)
            .arg(local.display().to_string())
            .arg(format!("{}:{}", destination, remote))
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, target: &RemoteTarget, command: &str) -> PluginResult<RemoteOutput> {
        debug!(host = %target.name, command, "Running remote command");
        let output = self.runner.run(&self.ssh_command(target, command)).await?;
        Ok(RemoteOutput {
            exit_code: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    async fn upload(
        &self,
        target: &RemoteTarget,
        local: &Path,
        remote: &str,
    ) -> PluginResult<()> {
        debug!(host = %target.name, local = %local.display(), remote, "Uploading file");
        self.runner
            .run_checked(&self.scp_command(target, local, remote))
            .await?;
        Ok(())
    }
}
