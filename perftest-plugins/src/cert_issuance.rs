//! Burst of certificate requests from every enrolled client

use async_trait::async_trait;
use perftest_config::ExecutionContext;
use perftest_core::{Producer, ResultCollection, TestResult};
use perftest_plugin::{
    fan_out, timestamp, Measurement, PluginError, PluginResult, RemoteJob, StageContext,
    TestPlugin, ADMIN_PASSWORD,
};
use perftest_provider::RoleDescriptor;
use serde_json::json;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::enrollment::{
    client_roles, configure_clients, finish_enrollment, spread_jobs, INSTALL_CLIENT,
};
use crate::templates::{AD_SETUP_PLAYBOOK, CERT_SERVER_CONFIG_PLAYBOOK, CERT_SERVER_TUNING_PLAYBOOK};

/// Open files needed locally to hold one ssh session per request
const OPEN_FILE_LIMIT: u64 = 16384;

/// WSGI processes when `--wsgi-processes` is not given
pub const DEFAULT_WSGI_PROCESSES: u32 = 4;

/// Directory restore password of the trust peer
const AD_SAFE_MODE_PASSWORD: &str = "Secret123";

/// Requests and issued certificates in one `getcert.log`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IssueTally {
    pub requested: u64,
    pub issued: u64,
}

impl IssueTally {
    /// Every `status:` line is a request, `MONITORING` ones were issued
    pub fn parse(log: &str) -> Self {
        let mut tally = Self::default();
        for line in log.lines().filter(|line| line.contains("status:")) {
            tally.requested += 1;
            if line.contains("MONITORING") {
                tally.issued += 1;
            }
        }
        tally
    }

    pub fn percentage(&self) -> u64 {
        if self.requested == 0 {
            0
        } else {
            (self.issued as f64 / self.requested as f64 * 100.0).round() as u64
        }
    }

    pub fn complete(&self) -> bool {
        self.requested > 0 && self.issued == self.requested
    }
}

/// Request `cert_requests` service certificates on every client at once
#[derive(Debug, Default)]
pub struct CertIssuanceTest {
    measurement: Option<Measurement>,
    /// Time spent collecting `ipa-getcert list`, kept apart from issuance
    collection_secs: Option<f64>,
    total: IssueTally,
}

impl CertIssuanceTest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request for service `index` of `host`, waiting for the certificate
    pub fn request_command(index: u32, host: &str, domain: &str) -> String {
        format!(
            "sudo ipa-getcert request -K service{i}/{host}.{domain} \
             -f /etc/pki/tls/certs/service{i}.pem \
             -k /etc/pki/tls/private/service{i}.key -v -w >> request.log 2>&1",
            i = index,
            host = host,
            domain = domain.to_lowercase()
        )
    }

    fn outcome_label(&self) -> &'static str {
        if self.total.complete() {
            "success"
        } else {
            "fails"
        }
    }
}

/// Raise the soft and hard open-file limit of this process, best-effort
fn raise_open_file_limit() {
    use nix::sys::resource::{setrlimit, Resource};

    match setrlimit(Resource::RLIMIT_NOFILE, OPEN_FILE_LIMIT, OPEN_FILE_LIMIT) {
        Ok(()) => info!(limit = OPEN_FILE_LIMIT, "Raised open file limit"),
        Err(e) => warn!(error = %e, "Could not raise open file limit"),
    }
}

impl Producer for CertIssuanceTest {
    fn source(&self) -> &str {
        module_path!()
    }

    fn test(&self) -> &str {
        "CertIssuanceTest"
    }
}

#[async_trait]
impl TestPlugin for CertIssuanceTest {
    fn custom_logs(&self) -> Vec<String> {
        vec!["getcert.log".to_string()]
    }

    fn validate(&self, ctx: &ExecutionContext) -> PluginResult<()> {
        let threads = match ctx.threads {
            Some(threads) if threads > 0 => threads,
            _ => return Err(PluginError::validation("threads number is required")),
        };
        if ctx.ad_threads > threads {
            return Err(PluginError::validation(format!(
                "ad-threads ({}) cannot exceed threads ({})",
                ctx.ad_threads, threads
            )));
        }
        Ok(())
    }

    fn generate_client_roles(&self, ctx: &ExecutionContext, domain: &str) -> Vec<RoleDescriptor> {
        let mut roles = client_roles(ctx.amount, domain);
        if ctx.ad_threads > 0 {
            roles.push(RoleDescriptor::ad(domain));
        }
        roles
    }

    async fn before_install_server(&mut self, stage: &StageContext<'_>) -> PluginResult<ResultCollection> {
        if stage.ctx.ad_threads > 0 {
            info!("Installing the Active Directory peer");
            stage
                .playbook_checked(
                    "certissuance_ad_setup",
                    AD_SETUP_PLAYBOOK,
                    &json!({ "domain": stage.domain, "ad_password": AD_SAFE_MODE_PASSWORD }),
                )
                .await?;
        }
        Ok(ResultCollection::new())
    }

    async fn run_workload(&mut self, stage: &StageContext<'_>) -> PluginResult<ResultCollection> {
        let mut results = ResultCollection::new();
        let clients = stage.clients();

        configure_clients(stage, "certissuance_client_config").await?;
        info!(clients = clients.len(), "Installing clients");
        let installs = fan_out(
            stage.remote,
            spread_jobs(&clients, &[INSTALL_CLIENT.to_string()]),
        )
        .await;
        results.add(finish_enrollment(&*self, stage, &installs).await?);

        let settings = json!({
            "amount": stage.ctx.amount,
            "services": stage.ctx.cert_requests,
            "wsgi_processes": stage.ctx.wsgi_processes.unwrap_or(DEFAULT_WSGI_PROCESSES),
            "domain": stage.domain,
            "password": ADMIN_PASSWORD,
        });
        stage
            .playbook_checked("certissuance_server_config", CERT_SERVER_CONFIG_PLAYBOOK, &settings)
            .await?;
        stage
            .playbook_checked("certissuance_server_tuning", CERT_SERVER_TUNING_PLAYBOOK, &settings)
            .await?;

        raise_open_file_limit();

        let mut jobs = Vec::new();
        for client in &clients {
            for i in 0..stage.ctx.cert_requests {
                jobs.push(RemoteJob::new(
                    client.clone(),
                    Self::request_command(i, &client.name, stage.domain),
                ));
            }
        }
        let requested = jobs.len();
        info!(requests = requested, "Waiting for certificate issuance");
        let started = Instant::now();
        let requests = fan_out(stage.remote, jobs).await;
        let issuance = started.elapsed().as_secs_f64();
        if requests.failed() > 0 {
            warn!(failed = requests.failed(), "Some certificate requests failed");
        }

        let listings = clients
            .iter()
            .map(|client| RemoteJob::new(client.clone(), "sudo ipa-getcert list > getcert.log"))
            .collect();
        let started = Instant::now();
        let listed = fan_out(stage.remote, listings).await;
        let collection = started.elapsed().as_secs_f64();
        if listed.failed() > 0 {
            warn!(failed = listed.failed(), "Collecting getcert output failed on some clients");
        }
        info!(issuance_secs = issuance, collection_secs = collection, "Certificate requests done");

        self.collection_secs = Some(collection);
        self.measurement = Some(Measurement {
            execution_time_secs: issuance,
            units: requested as u64,
            errors: requests.failed() as u64,
        });
        Ok(results)
    }

    async fn post_process(&mut self, stage: &StageContext<'_>) -> PluginResult<ResultCollection> {
        let mut results = ResultCollection::new();
        let mut total = IssueTally::default();

        for client in stage.clients() {
            let path = stage.layout.host_dir(&client.name).join("getcert.log");
            let log = match tokio::fs::read_to_string(&path).await {
                Ok(log) => log,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    results.add(TestResult::warning(
                        &*self,
                        format!("File sync/{}/getcert.log not found", client.name),
                    ));
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let tally = IssueTally::parse(&log);
            results.add(if tally.complete() {
                TestResult::success(&*self, format!("All threads on {} succeeded.", client.name))
            } else {
                TestResult::error(
                    &*self,
                    format!(
                        "Not all threads on {} succeeded: {}/{} ({}).",
                        client.name,
                        tally.issued,
                        tally.requested,
                        tally.percentage()
                    ),
                )
            });
            total.requested += tally.requested;
            total.issued += tally.issued;
        }
        self.total = total;
        if let Some(measurement) = self.measurement.as_mut() {
            measurement.errors = total.requested - total.issued;
        }

        if total.requested == 0 {
            results.add(TestResult::error(&*self, "None of the requests succeeded."));
            return Ok(results);
        }

        let mut summary = TestResult::success(
            &*self,
            format!(
                "{} requests out of {} succeeded ({}%)",
                total.issued,
                total.requested,
                total.percentage()
            ),
        )
        .with_kw("successes", total.issued);
        if let Some(collection) = self.collection_secs {
            summary = summary.with_kw("collection_time", collection);
        }
        results.add(summary);

        results.add(if total.complete() {
            TestResult::success(&*self, "All requests succeeded.")
        } else {
            TestResult::error(
                &*self,
                format!(
                    "Not all requests succeeded: {}/{} ({}).",
                    total.issued,
                    total.requested,
                    total.percentage()
                ),
            )
        });
        Ok(results)
    }

    fn measurement(&self) -> Option<Measurement> {
        self.measurement
    }

    fn archive_name(&self, ctx: &ExecutionContext, server_image: &str) -> String {
        format!(
            "CertIssuanceTest-{}-{}-{}clients-{}requests-{}issued-{}",
            timestamp(),
            server_image,
            ctx.amount,
            self.total.requested,
            self.total.issued,
            self.outcome_label()
        )
    }
}
