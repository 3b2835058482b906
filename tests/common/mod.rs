//! In-memory collaborators for driving full runs without hosts
//!
//! Every seam the engine reaches through is replaced here: the provider
//! comes from a [`ProviderCatalog`] entry named `fake`, remote commands and
//! playbooks are answered by recording fakes, and local programs never
//! start.

#![allow(dead_code)]

use async_trait::async_trait;
use perftest_config::{ExecutionContext, PerftestConfig, PollSettings};
use perftest_core::{Producer, ResultCollection};
use perftest_output::{OutputResult, ResultSink};
use perftest_plugin::{
    Dispatcher, PluginError, PluginResult, Procedure, ProcedureOutcome, ProcedureRunner,
    ProviderCatalog, RemoteAccess, RemoteExecutor, RemoteOutput, RemoteTarget, StageContext,
    TestPlugin, TestRegistry, Transport, WorkspaceLayout,
};
use perftest_provider::{
    CommandOutput, CommandRunner, CommandSpec, HostTopology, Provider, ProviderResult,
    ProvisioningPlan, RoleDescriptor,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const FAKE_PROVIDER: &str = "fake";
pub const FAKE_IMAGE: &str = "fedora-test";

/// Provisions whatever was described, minus the last `missing` hosts
pub struct FakeProvider {
    missing: usize,
    described: Vec<String>,
}

impl FakeProvider {
    pub fn new(missing: usize) -> Self {
        Self {
            missing,
            described: Vec::new(),
        }
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn name(&self) -> &'static str {
        FAKE_PROVIDER
    }

    async fn check_requirements(&self, _ctx: &ExecutionContext) -> ProviderResult<()> {
        Ok(())
    }

    async fn cleanup(&self, _ctx: &ExecutionContext) {}

    async fn generate_metadata(
        &mut self,
        _ctx: &ExecutionContext,
        manifest: &[RoleDescriptor],
        _domain: &str,
    ) -> ProviderResult<ProvisioningPlan> {
        self.described = manifest
            .iter()
            .map(|role| role.short_name().to_string())
            .collect();
        Ok(ProvisioningPlan {
            description: PathBuf::from("fake-topology.yaml"),
            hosts: self.described.clone(),
        })
    }

    async fn create_vms(&self, _ctx: &ExecutionContext) -> ProviderResult<()> {
        Ok(())
    }

    async fn collect_hosts(&self, _ctx: &ExecutionContext) -> ProviderResult<HostTopology> {
        let up = self.described.len().saturating_sub(self.missing);
        HostTopology::from_pairs(
            self.described
                .iter()
                .take(up)
                .enumerate()
                .map(|(i, name)| (name.clone(), format!("192.168.3.{}", i + 2))),
        )
    }

    fn default_private_key(&self) -> PathBuf {
        PathBuf::from("/nonexistent/id_rsa")
    }

    fn server_image(&self) -> &str {
        FAKE_IMAGE
    }

    fn files_to_log(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    fn ssh_user(&self) -> &str {
        "fedora"
    }

    fn windows_admin_password(&self) -> &str {
        "Secret123"
    }
}

/// Remote commands that succeed unless their host was marked failing
#[derive(Default)]
pub struct FakeRemote {
    failing_hosts: Mutex<Vec<String>>,
    replies: Mutex<Vec<(String, String)>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeRemote {
    pub fn fail_host(&self, host: &str) {
        self.failing_hosts.lock().unwrap().push(host.to_string());
    }

    /// Standard output for commands containing `fragment`
    pub fn reply(&self, fragment: &str, stdout: &str) {
        self.replies
            .lock()
            .unwrap()
            .push((fragment.to_string(), stdout.to_string()));
    }

    /// `(host, command)` in call order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands_on(&self, host: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(h, _)| h == host)
            .map(|(_, command)| command)
            .collect()
    }
}

#[async_trait]
impl RemoteExecutor for FakeRemote {
    async fn run(&self, target: &RemoteTarget, command: &str) -> PluginResult<RemoteOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((target.name.clone(), command.to_string()));

        if self.failing_hosts.lock().unwrap().contains(&target.name) {
            return Ok(RemoteOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: "simulated failure".to_string(),
            });
        }
        let stdout = self
            .replies
            .lock()
            .unwrap()
            .iter()
            .find(|(fragment, _)| command.contains(fragment.as_str()))
            .map(|(_, stdout)| stdout.clone())
            .unwrap_or_default();
        Ok(RemoteOutput {
            exit_code: 0,
            stdout,
            stderr: String::new(),
        })
    }

    async fn upload(&self, target: &RemoteTarget, local: &Path, remote: &str) -> PluginResult<()> {
        self.calls.lock().unwrap().push((
            target.name.clone(),
            format!("upload {} {}", local.display(), remote),
        ));
        Ok(())
    }
}

/// Playbooks that complete, report configured facts and "fetch" logs
#[derive(Default)]
pub struct FakeProcedures {
    failing: Mutex<Vec<String>>,
    facts: Mutex<BTreeMap<String, Map<String, Value>>>,
    fetched: Mutex<Vec<(PathBuf, String)>>,
    calls: Mutex<Vec<Procedure>>,
}

impl FakeProcedures {
    /// Report the procedure called `name` as unsuccessful
    pub fn fail(&self, name: &str) {
        self.failing.lock().unwrap().push(name.to_string());
    }

    pub fn set_fact(&self, host: &str, key: &str, value: impl Into<Value>) {
        self.facts
            .lock()
            .unwrap()
            .entry(host.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// File written when the log collection playbook runs
    pub fn on_fetch(&self, path: PathBuf, content: &str) {
        self.fetched
            .lock()
            .unwrap()
            .push((path, content.to_string()));
    }

    pub fn calls(&self) -> Vec<Procedure> {
        self.calls.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.calls().into_iter().map(|p| p.name).collect()
    }
}

#[async_trait]
impl ProcedureRunner for FakeProcedures {
    async fn run(&self, procedure: &Procedure) -> PluginResult<ProcedureOutcome> {
        self.calls.lock().unwrap().push(procedure.clone());

        if procedure.name == "fetch_logs" {
            let fetched = self.fetched.lock().unwrap().clone();
            for (path, content) in fetched {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, content).await?;
            }
        }

        let success = !self.failing.lock().unwrap().contains(&procedure.name);
        Ok(ProcedureOutcome {
            success,
            output: if success {
                format!("PLAY RECAP: {} ok", procedure.name)
            } else {
                format!("fatal: [server]: FAILED! {}", procedure.name)
            },
            facts: self.facts.lock().unwrap().clone(),
        })
    }
}

/// Local programs that always exit 0
#[derive(Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> ProviderResult<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        Ok(CommandOutput::default())
    }
}

pub struct FakeTransport {
    remote: Arc<FakeRemote>,
    procedures: Arc<FakeProcedures>,
}

impl Transport for FakeTransport {
    fn remote(&self, _access: &RemoteAccess) -> Arc<dyn RemoteExecutor> {
        self.remote.clone()
    }

    fn procedures(&self, _access: &RemoteAccess, _layout: &WorkspaceLayout) -> Arc<dyn ProcedureRunner> {
        self.procedures.clone()
    }
}

/// Captures whatever is rendered to it
pub struct MemorySink {
    stdout: bool,
    content: Mutex<String>,
}

impl MemorySink {
    pub fn stdout() -> Self {
        Self {
            stdout: true,
            content: Mutex::new(String::new()),
        }
    }

    pub fn content(&self) -> String {
        self.content.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    fn is_stdout(&self) -> bool {
        self.stdout
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn write(&self, content: &str) -> OutputResult<()> {
        *self.content.lock().unwrap() = content.to_string();
        Ok(())
    }
}

/// Workload that stops the run
pub struct CrashingTest;

impl Producer for CrashingTest {
    fn source(&self) -> &str {
        "integration::crashing"
    }

    fn test(&self) -> &str {
        "CrashingTest"
    }
}

#[async_trait]
impl TestPlugin for CrashingTest {
    fn generate_client_roles(&self, ctx: &ExecutionContext, domain: &str) -> Vec<RoleDescriptor> {
        perftest_plugins::enrollment::client_roles(ctx.amount, domain)
    }

    async fn run_workload(&mut self, _stage: &StageContext<'_>) -> PluginResult<ResultCollection> {
        Err(PluginError::workload("load generator crashed"))
    }
}

/// Workload that records nothing
pub struct QuietTest;

impl Producer for QuietTest {
    fn source(&self) -> &str {
        "integration::quiet"
    }

    fn test(&self) -> &str {
        "QuietTest"
    }
}

#[async_trait]
impl TestPlugin for QuietTest {
    async fn run_workload(&mut self, _stage: &StageContext<'_>) -> PluginResult<ResultCollection> {
        Ok(ResultCollection::new())
    }
}

/// A workspace in a temporary directory plus the fakes wired into it
pub struct Harness {
    pub dir: TempDir,
    pub remote: Arc<FakeRemote>,
    pub procedures: Arc<FakeProcedures>,
    pub runner: Arc<FakeRunner>,
    missing: usize,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temporary workspace");
        std::fs::create_dir_all(dir.path().join("resources")).expect("resources directory");
        Self {
            dir,
            remote: Arc::new(FakeRemote::default()),
            procedures: Arc::new(FakeProcedures::default()),
            runner: Arc::new(FakeRunner::default()),
            missing: 0,
        }
    }

    /// Hosts that will not come up, counted from the end of the manifest
    pub fn missing_hosts(mut self, missing: usize) -> Self {
        self.missing = missing;
        self
    }

    /// Number the server reports from `ipa host-find`
    pub fn registered_hosts(&self, count: usize) {
        self.procedures
            .set_fact("server", "host_find_output", count.to_string());
    }

    pub fn sync_dir(&self) -> PathBuf {
        self.dir.path().join("sync")
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.dir.path().join("runner_metadata")
    }

    pub fn config(&self) -> PerftestConfig {
        let mut config = PerftestConfig::default();
        config.workspace = config.workspace.rooted_at(self.dir.path());
        config.timing.cleanup_settle = Duration::ZERO;
        config.timing.collect_settle = Duration::ZERO;
        let quick = PollSettings::new(Duration::from_millis(1), Duration::from_secs(1));
        config.timing.monitoring_poll = quick;
        config.timing.queue_poll = quick;
        config
    }

    /// Built-in tests plus the crashing and quiet ones
    pub fn registry(&self) -> TestRegistry {
        let mut registry = perftest_plugins::default_registry().expect("built-in tests");
        registry
            .register("CrashingTest", |_| Box::new(CrashingTest))
            .expect("CrashingTest");
        registry
            .register("QuietTest", |_| Box::new(QuietTest))
            .expect("QuietTest");
        registry
    }

    pub fn dispatcher(&self) -> Dispatcher {
        let missing = self.missing;
        let mut providers = ProviderCatalog::new();
        providers.register([FAKE_PROVIDER], move |_runner, _settings| {
            Box::new(FakeProvider::new(missing))
        });

        Dispatcher::new(self.registry(), self.config())
            .with_runner(self.runner.clone())
            .with_transport(Arc::new(FakeTransport {
                remote: self.remote.clone(),
                procedures: self.procedures.clone(),
            }))
            .with_providers(providers)
    }
}

/// Context for `test` on the fake provider
pub fn context(test: &str, amount: u32) -> ExecutionContext {
    let mut ctx = ExecutionContext::for_test(test);
    ctx.provider = FAKE_PROVIDER.to_string();
    ctx.amount = amount;
    ctx
}
