//! Concurrent IPA API commands scheduled through `at`

use async_trait::async_trait;
use chrono::Utc;
use perftest_config::ExecutionContext;
use perftest_core::{Producer, ResultCollection, TestResult};
use perftest_plugin::{
    fan_out, poll_until, timestamp, Measurement, PluginError, PluginResult, RemoteJob,
    StageContext, TestPlugin,
};
use perftest_provider::RoleDescriptor;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::enrollment::{client_roles, configure_clients};

/// Commands scheduled on each client
pub const COMMANDS_PER_CLIENT: u32 = 25;

/// `at` queue listing once only the spool directory is left
const QUEUE_DRAINED: &str = "1";

/// Runs `amount` copies of `--command` spread over the clients, all
/// starting at the same minute
#[derive(Debug, Default)]
pub struct ApiTest {
    measurement: Option<Measurement>,
    failures: u32,
}

impl ApiTest {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Clients needed for `amount` commands
pub fn clients_for(amount: u32) -> u32 {
    amount.div_ceil(COMMANDS_PER_CLIENT)
}

/// Queue one command with `at`, logging the command, its output and its
/// exit status to `~/command<index>log`
pub fn scheduled_command(template: &str, index: u32, amount: u32, at_time: &str) -> String {
    let width = amount.to_string().len();
    let id = format!("{:0width$}", index, width = width);
    let command = template.replace("{id}", &id);
    format!(
        "echo 'echo {cmd} > ~/command{i}log;{cmd} >> ~/command{i}log 2>&1;echo $? >> ~/command{i}log' | at {time}",
        cmd = command,
        i = index,
        time = at_time
    )
}

/// Parse the server's `<HH:MM> <epoch>` answer into the `at` time and the
/// epoch of the minute it fires in
pub fn parse_schedule(text: &str) -> Option<(String, i64)> {
    let (at_time, epoch) = text.trim().split_once(' ')?;
    let epoch: i64 = epoch.trim().parse().ok()?;
    Some((at_time.to_string(), epoch - epoch.rem_euclid(60)))
}

/// Outcome of one `command<i>log`: the command line and its exit status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLog {
    pub command: String,
    pub returncode: String,
}

impl CommandLog {
    pub fn parse(content: &str) -> Option<Self> {
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let first = lines.first()?;
        let last = lines.last()?;
        Some(Self {
            command: first.trim().to_string(),
            returncode: last.trim().to_string(),
        })
    }

    pub fn succeeded(&self) -> bool {
        self.returncode == "0"
    }
}

/// Every `command*` log fetched from the clients, as `(host, log)` pairs in
/// host then file name order
async fn read_command_logs(sync: &Path) -> PluginResult<Vec<(String, CommandLog)>> {
    let mut hosts = Vec::new();
    let mut entries = tokio::fs::read_dir(sync).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("client") && entry.file_type().await?.is_dir() {
            hosts.push(name);
        }
    }
    hosts.sort();

    let mut logs = Vec::new();
    for host in hosts {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(sync.join(&host)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("command") {
                files.push(entry.path());
            }
        }
        files.sort();

        for file in files {
            let content = tokio::fs::read_to_string(&file).await?;
            match CommandLog::parse(&content) {
                Some(log) => logs.push((host.clone(), log)),
                None => warn!(file = %file.display(), "Empty command log"),
            }
        }
    }
    Ok(logs)
}

impl Producer for ApiTest {
    fn source(&self) -> &str {
        module_path!()
    }

    fn test(&self) -> &str {
        "APITest"
    }
}

#[async_trait]
impl TestPlugin for ApiTest {
    fn custom_logs(&self) -> Vec<String> {
        vec!["command*log".to_string()]
    }

    fn validate(&self, ctx: &ExecutionContext) -> PluginResult<()> {
        match ctx.command.as_deref() {
            Some(command) if !command.trim().is_empty() => Ok(()),
            _ => Err(PluginError::validation("command is required")),
        }
    }

    fn generate_client_roles(&self, ctx: &ExecutionContext, domain: &str) -> Vec<RoleDescriptor> {
        client_roles(clients_for(ctx.amount), domain)
    }

    async fn run_workload(&mut self, stage: &StageContext<'_>) -> PluginResult<ResultCollection> {
        let template = stage
            .ctx
            .command
            .clone()
            .ok_or_else(|| PluginError::validation("command is required"))?;
        let clients = stage.clients();
        if clients.is_empty() {
            return Err(PluginError::workload("no clients to run commands on"));
        }

        info!("Deploying clients");
        configure_clients(stage, "apitest_client_config").await?;
        stage
            .procedures
            .run_checked(&stage.collection_playbook("install-client.yml"))
            .await?;

        // Two minutes per client for the scheduling round trips
        let now = stage
            .run_on_server(&format!(
                "date --date now+{}min '+%H:%M %s'",
                clients.len() * 2
            ))
            .await?;
        let (at_time, starts_at) = parse_schedule(now.text()).ok_or_else(|| {
            PluginError::workload(format!("unexpected server time '{}'", now.text()))
        })?;

        let kinit = clients
            .iter()
            .map(|client| RemoteJob::new(client.clone(), "echo password | kinit admin"))
            .collect();
        let tickets = fan_out(stage.remote, kinit).await;
        if tickets.failed() > 0 {
            warn!(failed = tickets.failed(), "kinit failed on some clients");
        }

        let mut per_client: Vec<Vec<String>> = vec![Vec::new(); clients.len()];
        for i in 0..stage.ctx.amount {
            let slot = ((i / COMMANDS_PER_CLIENT) as usize).min(clients.len() - 1);
            per_client[slot].push(scheduled_command(&template, i, stage.ctx.amount, &at_time));
        }
        let jobs = clients
            .iter()
            .zip(per_client)
            .filter(|(_, commands)| !commands.is_empty())
            .map(|(client, commands)| RemoteJob::new(client.clone(), commands.join(" && ")))
            .collect();
        let scheduled = fan_out(stage.remote, jobs).await;
        for outcome in scheduled.outcomes().iter().filter(|o| !o.success()) {
            warn!(host = %outcome.host, "Scheduling commands failed");
        }
        info!(at = %at_time, "Commands will run at this machine local time");

        let remote = stage.remote;
        let clients = &clients;
        poll_until("scheduled API commands", &stage.timing.queue_poll, || async move {
            let jobs = clients
                .iter()
                .map(|client| RemoteJob::new(client.clone(), "sudo ls /var/spool/at | wc -l"))
                .collect();
            let pending = fan_out(remote, jobs).await;
            debug!(pending = ?pending.by_host(), "Checked at queues");
            Ok::<_, PluginError>(
                pending
                    .outcomes()
                    .iter()
                    .all(|o| o.output.text() == QUEUE_DRAINED),
            )
        })
        .await?;

        let elapsed = (Utc::now().timestamp() - starts_at).max(0);
        self.measurement = Some(Measurement {
            execution_time_secs: elapsed as f64,
            units: u64::from(stage.ctx.amount),
            errors: 0,
        });
        Ok(ResultCollection::new())
    }

    async fn post_process(&mut self, stage: &StageContext<'_>) -> PluginResult<ResultCollection> {
        let amount = stage.ctx.amount;
        let logs = read_command_logs(&stage.layout.sync).await?;

        let mut lines = Vec::with_capacity(logs.len());
        let mut succeeded = 0u32;
        for (host, log) in &logs {
            let line = format!(
                "Command '{}' returned {} on {}",
                log.command, log.returncode, host
            );
            info!("{}", line);
            lines.push(line);
            if log.succeeded() {
                succeeded += 1;
            }
        }
        stage.layout.write_returncodes(lines).await?;

        self.failures = amount.saturating_sub(succeeded);
        if let Some(measurement) = self.measurement.as_mut() {
            measurement.errors = u64::from(self.failures);
        }

        let result = if succeeded == amount {
            TestResult::success(&*self, "All commands executed successfully.")
        } else {
            TestResult::error(
                &*self,
                format!(
                    "Not all commands completed successfully ({}/{}). Check logs.",
                    succeeded, amount
                ),
            )
        };
        Ok(ResultCollection::from(vec![result]))
    }

    fn measurement(&self) -> Option<Measurement> {
        self.measurement
    }

    fn archive_name(&self, ctx: &ExecutionContext, server_image: &str) -> String {
        format!(
            "APITest-{}-{}-{}commands-{}fails",
            timestamp(),
            server_image,
            ctx.amount,
            self.failures
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clients_for() {
        assert_eq!(clients_for(1), 1);
        assert_eq!(clients_for(25), 1);
        assert_eq!(clients_for(26), 2);
        assert_eq!(clients_for(100), 4);
        assert_eq!(clients_for(0), 0);
    }

    #[test]
    fn test_scheduled_command() {
        let command = scheduled_command("ipa user-add user{id} --first a --last b", 7, 100, "14:05");
        assert_eq!(
            command,
            "echo 'echo ipa user-add user007 --first a --last b > ~/command7log;\
             ipa user-add user007 --first a --last b >> ~/command7log 2>&1;\
             echo $? >> ~/command7log' | at 14:05"
        );

        let unpadded = scheduled_command("ipa ping", 3, 5, "09:00");
        assert!(unpadded.starts_with("echo 'echo ipa ping > ~/command3log;"));
    }

    #[test]
    fn test_parse_schedule() {
        assert_eq!(
            parse_schedule("14:05 1700000730\n"),
            Some(("14:05".to_string(), 1700000700))
        );
        assert_eq!(parse_schedule("14:05"), None);
        assert_eq!(parse_schedule("14:05 soon"), None);
    }

    #[test]
    fn test_command_log() {
        let log = CommandLog::parse("ipa ping\n------\nIPA server version 4.11\n------\n0\n").unwrap();
        assert_eq!(log.command, "ipa ping");
        assert!(log.succeeded());

        let failed = CommandLog::parse("ipa user-show nobody\nipa: ERROR: nobody: user not found\n2\n").unwrap();
        assert_eq!(failed.returncode, "2");
        assert!(!failed.succeeded());

        assert_eq!(CommandLog::parse("\n"), None);
    }

    #[tokio::test]
    async fn test_read_command_logs() {
        let dir = tempfile::tempdir().unwrap();
        let sync = dir.path();
        std::fs::create_dir_all(sync.join("client001")).unwrap();
        std::fs::create_dir_all(sync.join("client000")).unwrap();
        std::fs::create_dir_all(sync.join("server")).unwrap();
        std::fs::write(sync.join("client001/command30log"), "ipa ping\n1\n").unwrap();
        std::fs::write(sync.join("client000/command1log"), "ipa ping\n0\n").unwrap();
        std::fs::write(sync.join("client000/command0log"), "ipa ping\n0\n").unwrap();
        std::fs::write(sync.join("client000/ipaclient-install.log"), "done\n").unwrap();
        std::fs::write(sync.join("server/command9log"), "ipa ping\n0\n").unwrap();

        let logs = read_command_logs(sync).await.unwrap();
        let hosts: Vec<_> = logs.iter().map(|(host, _)| host.as_str()).collect();
        assert_eq!(hosts, vec!["client000", "client000", "client001"]);
        assert_eq!(logs.iter().filter(|(_, log)| log.succeeded()).count(), 2);
    }

    #[test]
    fn test_command_required() {
        let test = ApiTest::new();
        let mut ctx = ExecutionContext::for_test("APITest");
        assert!(matches!(test.validate(&ctx), Err(PluginError::Validation(_))));

        ctx.command = Some("ipa ping".to_string());
        assert!(test.validate(&ctx).is_ok());
    }
}
