//! PAM authentication storm against enrolled clients

use async_trait::async_trait;
use chrono::Utc;
use perftest_config::ExecutionContext;
use perftest_core::{Producer, ResultCollection, TestResult};
use perftest_plugin::{
    fan_out, timestamp, Measurement, PluginError, PluginResult, RemoteJob, StageContext,
    SyncPoint, TestPlugin,
};
use perftest_provider::RoleDescriptor;
use std::path::Path;
use tracing::{info, warn};

use crate::enrollment::{
    client_roles, finish_enrollment, resolver_commands, spread_jobs, INSTALL_CLIENT,
};

/// Authentication threads per client when `--threads` is not given
pub const DEFAULT_THREADS: u32 = 10;

/// Test data generators expected in the resources directory
const DATA_SCRIPTS: [&str; 2] = ["create-test-data.py", "set-password.py"];

/// Thread tally of one `pamtest.log`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThreadTally {
    pub threads: u64,
    pub succeeded: u64,
}

impl ThreadTally {
    /// Count `Thread returned <rc>` lines; an unparsable code is a failure
    pub fn parse(log: &str) -> Self {
        let mut tally = Self::default();
        for line in log.lines() {
            let Some(code) = line.strip_prefix("Thread returned") else {
                continue;
            };
            tally.threads += 1;
            if code.trim().parse::<i64>() == Ok(0) {
                tally.succeeded += 1;
            }
        }
        tally
    }

    /// Rounded success percentage, 0 when no thread reported
    pub fn percentage(&self) -> u64 {
        if self.threads == 0 {
            0
        } else {
            (self.succeeded as f64 / self.threads as f64 * 100.0).round() as u64
        }
    }

    pub fn failed(&self) -> u64 {
        self.threads - self.succeeded
    }
}

/// Loads users for every client, enrolls the clients, then fires `pamtest`
/// on all of them at once
#[derive(Debug, Default)]
pub struct AuthenticationTest {
    measurement: Option<Measurement>,
    failures: u64,
}

impl AuthenticationTest {
    pub fn new() -> Self {
        Self::default()
    }

    fn server_commands(amount: u32, threads: u32) -> Vec<String> {
        vec![
            "sudo dnf -y install python3-click".to_string(),
            format!(
                "python3 create-test-data.py --hosts {} --outfile userdata.ldif",
                amount
            ),
            "echo password | kinit admin".to_string(),
            "ipa config-mod --enable-migration=true".to_string(),
            "ldapadd -x -D 'cn=Directory Manager' -w password -f userdata.ldif".to_string(),
            format!(
                "python3 set-password.py --dm-password password --hosts {} --users-per-host {}",
                amount, threads
            ),
            "ipa config-mod --enable-migration=false".to_string(),
        ]
    }

    fn client_commands(server_address: &str) -> Vec<String> {
        let [remove, nameserver] = resolver_commands(server_address);
        vec![
            "sudo dnf -y copr enable antorres/freeipa-perftest".to_string(),
            "sudo dnf -y install freeipa-perftest-client".to_string(),
            remove,
            nameserver,
            INSTALL_CLIENT.to_string(),
        ]
    }

    /// Authentication for the `index`-th of `clients`; with a spread the
    /// start times are laid out evenly over `spread_minutes`
    fn auth_command(
        sync: SyncPoint,
        index: usize,
        clients: usize,
        spread_minutes: u32,
        threads: u32,
    ) -> String {
        let offset = if clients == 0 {
            0
        } else {
            i64::from(spread_minutes) * 60 * index as i64 / clients as i64
        };
        [
            sync.offset(offset).sleep_command(),
            "sudo sed -i 's/session    required     pam_loginuid.so//' /etc/pam.d/login"
                .to_string(),
            format!("sudo pamtest --threads {} -o pamtest.log", threads),
        ]
        .join(" && ")
    }

    async fn load_test_data(&self, stage: &StageContext<'_>) -> PluginResult<Option<TestResult>> {
        let server = stage.server()?;
        for script in DATA_SCRIPTS {
            let local = stage.layout.resources.join(script);
            stage.remote.upload(&server, &local, script).await?;
        }

        let commands = Self::server_commands(stage.ctx.amount, stage.ctx.threads_or(DEFAULT_THREADS));
        let output = stage.remote.run(&server, &commands.join(" && ")).await?;
        if output.success() {
            info!("Test users loaded");
            Ok(None)
        } else {
            warn!(exit_code = output.exit_code, "Loading test users failed");
            Ok(Some(
                TestResult::warning(self, "Loading test users on the server failed.")
                    .with_kw("returncode", output.exit_code)
                    .with_kw("stderr", output.stderr.trim()),
            ))
        }
    }
}

impl Producer for AuthenticationTest {
    fn source(&self) -> &str {
        module_path!()
    }

    fn test(&self) -> &str {
        "AuthenticationTest"
    }
}

#[async_trait]
impl TestPlugin for AuthenticationTest {
    fn custom_logs(&self) -> Vec<String> {
        vec!["pamtest.log".to_string()]
    }

    fn generate_client_roles(&self, ctx: &ExecutionContext, domain: &str) -> Vec<RoleDescriptor> {
        client_roles(ctx.amount, domain)
    }

    async fn run_workload(&mut self, stage: &StageContext<'_>) -> PluginResult<ResultCollection> {
        let mut results = ResultCollection::new();
        if let Some(warning) = self.load_test_data(stage).await? {
            results.add(warning);
        }

        let server = stage.server()?;
        let clients = stage.clients();
        info!(clients = clients.len(), "Installing clients");
        let installs = fan_out(
            stage.remote,
            spread_jobs(&clients, &Self::client_commands(&server.address)),
        )
        .await;
        results.add(finish_enrollment(&*self, stage, &installs).await?);

        let threads = stage.ctx.threads_or(DEFAULT_THREADS);
        let sync = SyncPoint::for_hosts(Utc::now(), stage.topology.len());
        let jobs = clients
            .iter()
            .enumerate()
            .map(|(i, client)| {
                RemoteJob::new(
                    client.clone(),
                    Self::auth_command(sync, i, clients.len(), stage.ctx.auth_spread, threads),
                )
            })
            .collect();

        info!(at = sync.epoch(), spread = stage.ctx.auth_spread, "Running authentications");
        let auths = fan_out(stage.remote, jobs).await;
        if auths.failed() > 0 {
            warn!(failed = auths.failed(), "pamtest failed on some clients");
        }

        let elapsed = (Utc::now().timestamp() - sync.epoch()).max(0);
        self.measurement = Some(Measurement {
            execution_time_secs: elapsed as f64,
            units: clients.len() as u64 * u64::from(threads),
            errors: 0,
        });
        Ok(results)
    }

    async fn post_process(&mut self, stage: &StageContext<'_>) -> PluginResult<ResultCollection> {
        let mut results = ResultCollection::new();
        let mut total = ThreadTally::default();

        for client in stage.clients() {
            let path = stage.layout.host_dir(&client.name).join("pamtest.log");
            let log = match tokio::fs::read_to_string(&path).await {
                Ok(log) => log,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    results.add(TestResult::warning(
                        &*self,
                        format!("File {} not found", display_path(&path)),
                    ));
                    continue;
                }
                Err(e) => return Err(PluginError::from(e)),
            };

            let tally = ThreadTally::parse(&log);
            info!(
                host = %client.name,
                succeeded = tally.succeeded,
                threads = tally.threads,
                "{}% of threads succeeded",
                tally.percentage()
            );
            let message = format!(
                "{} had {} successes out of {} threads ({}%)",
                client.name,
                tally.succeeded,
                tally.threads,
                tally.percentage()
            );
            results.add(if tally.threads > 0 && tally.failed() == 0 {
                TestResult::success(&*self, message)
            } else {
                TestResult::error(&*self, message)
            });
            total.threads += tally.threads;
            total.succeeded += tally.succeeded;
        }

        self.failures = total.failed();
        if let Some(measurement) = self.measurement.as_mut() {
            measurement.errors = total.failed();
        }

        let message = format!(
            "{} threads out of {} succeeded ({}%)",
            total.succeeded,
            total.threads,
            total.percentage()
        );
        let summary = if total.threads > 0 && total.failed() == 0 {
            TestResult::success(&*self, message)
        } else {
            TestResult::error(&*self, message)
        };
        results.add(summary.with_kw("successes", total.succeeded));
        Ok(results)
    }

    fn measurement(&self) -> Option<Measurement> {
        self.measurement
    }

    fn archive_name(&self, ctx: &ExecutionContext, server_image: &str) -> String {
        format!(
            "AuthenticationTest-{}-{}-{}clients-{}threads-{}fails",
            timestamp(),
            server_image,
            ctx.amount,
            ctx.threads_or(DEFAULT_THREADS),
            self.failures
        )
    }
}

/// `sync/<host>/<file>` form of a fetched log path
fn display_path(path: &Path) -> String {
    let parts: Vec<_> = path.components().rev().take(3).collect();
    parts
        .iter()
        .rev()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
