//! How the engine reaches provisioned hosts

use perftest_provider::CommandRunner;
use std::sync::Arc;

use crate::procedure::{AnsibleRunner, ProcedureRunner};
use crate::remote::{RemoteAccess, RemoteExecutor, SshExecutor};
use crate::workspace::WorkspaceLayout;

/// Builds the remote and procedure seams once credentials are known.
///
/// Credentials only exist after a provider is selected, so executors are
/// created per run rather than up front.
pub trait Transport: Send + Sync {
    fn remote(&self, access: &RemoteAccess) -> Arc<dyn RemoteExecutor>;

    fn procedures(&self, access: &RemoteAccess, layout: &WorkspaceLayout) -> Arc<dyn ProcedureRunner>;
}

/// ssh/scp and Ansible through the local command runner
pub struct SystemTransport {
    runner: Arc<dyn CommandRunner>,
}

impl SystemTransport {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl Transport for SystemTransport {
    fn remote(&self, access: &RemoteAccess) -> Arc<dyn RemoteExecutor> {
        Arc::new(SshExecutor::new(self.runner.clone(), access.clone()))
    }

    fn procedures(&self, access: &RemoteAccess, layout: &WorkspaceLayout) -> Arc<dyn ProcedureRunner> {
        Arc::new(AnsibleRunner::new(
            self.runner.clone(),
            layout.clone(),
            access.clone(),
        ))
    }
}
