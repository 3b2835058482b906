//! Client enrollment shared by the workloads, and the enrollment test itself

use async_trait::async_trait;
use chrono::Utc;
use perftest_config::ExecutionContext;
use perftest_core::{Producer, ResultCollection, TestResult};
use perftest_plugin::{
    fan_out, run_sequentially, timestamp, FanOut, Measurement, PluginResult, RemoteJob,
    RemoteTarget, StageContext, SyncPoint, TestPlugin, ADMIN_PASSWORD,
};
use perftest_provider::RoleDescriptor;
use rand::Rng;
use serde_json::json;
use tracing::{info, warn};

use crate::templates::{CLIENT_CONFIG_PLAYBOOK, COUNT_HOSTS_PLAYBOOK};

/// Unattended client installation against the admin account
pub const INSTALL_CLIENT: &str =
    "sudo ipa-client-install -p admin -w password -U --enable-dns-updates --no-nisdomain -N";

/// `client000`, `client001`, ...
pub fn client_name(index: u32) -> String {
    format!("client{:03}", index)
}

pub fn client_roles(count: u32, domain: &str) -> Vec<RoleDescriptor> {
    (0..count)
        .map(|i| RoleDescriptor::client(&client_name(i), domain))
        .collect()
}

/// Replace the resolver with the IPA server
pub fn resolver_commands(server_address: &str) -> [String; 2] {
    [
        "sudo rm -f /etc/resolv.conf".to_string(),
        format!(
            "{{ echo 'nameserver {}' | sudo tee -a /etc/resolv.conf; }}",
            server_address
        ),
    ]
}

/// Staggered start for the `installed`-th client (1-based): 20s, plus 20s
/// for every 30 clients, plus `jitter`
pub fn spread_delay(installed: usize, jitter: u64) -> u64 {
    20 + 20 * (installed / 30) as u64 + jitter
}

/// One job per client, each sleeping for its spread delay before `commands`
pub fn spread_jobs(clients: &[RemoteTarget], commands: &[String]) -> Vec<RemoteJob> {
    let mut rng = rand::rng();
    clients
        .iter()
        .enumerate()
        .map(|(i, client)| {
            let delay = spread_delay(i + 1, rng.random_range(1..10));
            let mut steps = vec![format!("sleep {}", delay)];
            steps.extend(commands.iter().cloned());
            RemoteJob::new(client.clone(), steps.join(" && "))
        })
        .collect()
}

/// Resolver and hosts file on every client, before enrollment
pub async fn configure_clients(stage: &StageContext<'_>, name: &str) -> PluginResult<()> {
    let server = stage.server()?;
    stage
        .playbook_checked(
            name,
            CLIENT_CONFIG_PLAYBOOK,
            &json!({ "server_ip": server.address, "domain": stage.domain }),
        )
        .await?;
    Ok(())
}

/// Wait for the install jobs, write the return codes and check the server
/// agrees on how many hosts enrolled
pub async fn finish_enrollment<P: Producer + ?Sized>(
    producer: &P,
    stage: &StageContext<'_>,
    installs: &FanOut,
) -> PluginResult<TestResult> {
    for line in installs.returncode_lines() {
        info!("{}", line);
    }
    stage
        .layout
        .write_returncodes(installs.returncode_lines())
        .await?;
    info!(
        succeeded = installs.succeeded(),
        failed = installs.failed(),
        "Client installs finished"
    );

    let outcome = stage
        .playbook(
            "count_hosts",
            COUNT_HOSTS_PLAYBOOK,
            &json!({ "password": ADMIN_PASSWORD }),
        )
        .await?;
    if !outcome.success {
        warn!("Counting registered hosts failed");
    }
    let found = outcome.fact_text("server", "host_find_output");
    Ok(enrollment_result(
        producer,
        found.as_deref(),
        installs.succeeded(),
        installs.failed(),
        stage.ipa_host_count(),
    ))
}

/// Compare the install outcome with the number of hosts the server knows
pub fn enrollment_result<P: Producer + ?Sized>(
    producer: &P,
    host_find_output: Option<&str>,
    succeeded: usize,
    failed: usize,
    ipa_hosts: usize,
) -> TestResult {
    let raw = host_find_output.unwrap_or_default();
    let Ok(registered) = raw.trim().parse::<usize>() else {
        return TestResult::error(
            producer,
            format!("Failed to convert host-find output to int. Value was: {}", raw),
        );
    };

    if registered == succeeded + ipa_hosts && failed == 0 {
        TestResult::success(producer, "All clients enrolled successfully.")
    } else {
        TestResult::error(
            producer,
            format!(
                "Client installs succeeded number ({}) does not match host-find output ({}).",
                succeeded, registered
            ),
        )
        .with_kw("failed", failed as u64)
    }
}

/// Enroll `amount` clients at one synchronised moment
#[derive(Debug, Default)]
pub struct EnrollmentTest {
    measurement: Option<Measurement>,
    failures: usize,
}

impl EnrollmentTest {
    pub fn new() -> Self {
        Self::default()
    }

    fn install_commands(server_address: &str, sync: Option<SyncPoint>) -> String {
        let [remove, nameserver] = resolver_commands(server_address);
        let mut steps = vec![remove, nameserver];
        if let Some(sync) = sync {
            steps.push(sync.sleep_command());
        }
        steps.push(INSTALL_CLIENT.to_string());
        steps.join(" && ")
    }
}

impl Producer for EnrollmentTest {
    fn source(&self) -> &str {
        module_path!()
    }

    fn test(&self) -> &str {
        "EnrollmentTest"
    }
}

#[async_trait]
impl TestPlugin for EnrollmentTest {
    fn generate_client_roles(&self, ctx: &ExecutionContext, domain: &str) -> Vec<RoleDescriptor> {
        client_roles(ctx.amount, domain)
    }

    async fn run_workload(&mut self, stage: &StageContext<'_>) -> PluginResult<ResultCollection> {
        let server = stage.server()?;
        let clients = stage.clients();

        let installs = if stage.ctx.sequential {
            info!(clients = clients.len(), "Installing clients one at a time");
            let command = Self::install_commands(&server.address, None);
            let jobs = clients
                .into_iter()
                .map(|client| RemoteJob::new(client, command.clone()))
                .collect();
            let started = Utc::now().timestamp_millis();
            let installs = run_sequentially(stage.remote, jobs).await;
            self.record(started, &installs);
            installs
        } else {
            let sync = SyncPoint::for_hosts(Utc::now(), stage.topology.len());
            info!(clients = clients.len(), at = sync.epoch(), "Installing clients together");
            let command = Self::install_commands(&server.address, Some(sync));
            let jobs = clients
                .into_iter()
                .map(|client| RemoteJob::new(client, command.clone()))
                .collect();
            let installs = fan_out(stage.remote, jobs).await;
            self.record(sync.epoch() * 1000, &installs);
            installs
        };

        let result = finish_enrollment(&*self, stage, &installs).await?;
        Ok(ResultCollection::from(vec![result]))
    }

    fn measurement(&self) -> Option<Measurement> {
        self.measurement
    }

    fn archive_name(&self, ctx: &ExecutionContext, server_image: &str) -> String {
        format!(
            "EnrollmentTest-{}-{}-{}clients-{}fails",
            timestamp(),
            server_image,
            ctx.amount,
            self.failures
        )
    }
}

impl EnrollmentTest {
    /// Elapsed wall-clock time since `started_ms`, never negative
    fn record(&mut self, started_ms: i64, installs: &FanOut) {
        let elapsed_ms = (Utc::now().timestamp_millis() - started_ms).max(0);
        self.failures = installs.failed();
        self.measurement = Some(Measurement {
            execution_time_secs: elapsed_ms as f64 / 1000.0,
            units: installs.len() as u64,
            errors: installs.failed() as u64,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perftest_core::Level;

    #[test]
    fn test_client_roles() {
        let roles = client_roles(3, "ipa.test");
        let names: Vec<_> = roles.iter().map(|r| r.hostname.as_str()).collect();
        assert_eq!(
            names,
            vec!["client000.ipa.test", "client001.ipa.test", "client002.ipa.test"]
        );
        assert!(client_roles(0, "ipa.test").is_empty());
    }

    #[test]
    fn test_spread_delay() {
        assert_eq!(spread_delay(1, 5), 25);
        assert_eq!(spread_delay(29, 1), 21);
        assert_eq!(spread_delay(30, 1), 41);
        assert_eq!(spread_delay(61, 9), 69);
    }

    #[test]
    fn test_spread_jobs() {
        let clients = vec![RemoteTarget::new("client000", "10.0.0.5")];
        let jobs = spread_jobs(&clients, &[INSTALL_CLIENT.to_string()]);
        assert_eq!(jobs.len(), 1);

        let (sleep, rest) = jobs[0].command.split_once(" && ").unwrap();
        let delay: u64 = sleep.trim_start_matches("sleep ").parse().unwrap();
        assert!((21..=29).contains(&delay));
        assert_eq!(rest, INSTALL_CLIENT);
    }

    #[test]
    fn test_install_commands() {
        let command = EnrollmentTest::install_commands("192.168.3.2", Some(SyncPoint::at(1700000000)));
        assert_eq!(
            command,
            "sudo rm -f /etc/resolv.conf && \
             { echo 'nameserver 192.168.3.2' | sudo tee -a /etc/resolv.conf; } && \
             sleep $(( 1700000000 - $(date +%s) )) && \
             sudo ipa-client-install -p admin -w password -U --enable-dns-updates --no-nisdomain -N"
        );

        let sequential = EnrollmentTest::install_commands("192.168.3.2", None);
        assert!(!sequential.contains("sleep"));
    }

    #[test]
    fn test_enrollment_result() {
        let test = EnrollmentTest::new();

        let ok = enrollment_result(&test, Some("11"), 10, 0, 1);
        assert_eq!(ok.level(), Level::Success);
        assert_eq!(ok.kw_str("msg"), Some("All clients enrolled successfully."));

        let mismatch = enrollment_result(&test, Some("9"), 8, 2, 1);
        assert_eq!(mismatch.level(), Level::Error);
        assert_eq!(
            mismatch.kw_str("error"),
            Some("Client installs succeeded number (8) does not match host-find output (9).")
        );

        let garbage = enrollment_result(&test, Some("ipa: ERROR: not logged in"), 10, 0, 1);
        assert_eq!(garbage.level(), Level::Error);
        assert!(garbage
            .kw_str("error")
            .unwrap()
            .starts_with("Failed to convert host-find output to int."));

        let missing = enrollment_result(&test, None, 10, 0, 1);
        assert_eq!(missing.level(), Level::Error);
    }

    #[test]
    fn test_archive_name() {
        let mut test = EnrollmentTest::new();
        test.failures = 2;
        let mut ctx = ExecutionContext::for_test("EnrollmentTest");
        ctx.amount = 10;

        let name = test.archive_name(&ctx, "fedora38-cloud-base");
        assert!(name.starts_with("EnrollmentTest-"));
        assert!(name.ends_with("-fedora38-cloud-base-10clients-2fails"));
    }
}
