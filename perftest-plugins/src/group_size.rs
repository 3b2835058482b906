//! Time to add one member to a large group

use async_trait::async_trait;
use perftest_config::ExecutionContext;
use perftest_core::{Producer, ResultCollection, TestResult};
use perftest_plugin::{
    timestamp, Measurement, PluginResult, StageContext, TestPlugin, ADMIN_PASSWORD,
};
use serde_json::json;
use tracing::{info, warn};

use crate::templates::GROUPSIZE_SERVER_CONFIG_PLAYBOOK;

/// Log of the timed membership change, in the server's home directory
const MEMBER_LOG: &str = "group_add_member.log";

/// Fills a group with `threads` users, optionally nested through
/// `number_of_subgroups` subgroups, and times adding one more user.
///
/// `threads` is the group size here.
#[derive(Debug, Default)]
pub struct GroupSizeTest {
    real: Option<String>,
}

impl GroupSizeTest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timed `group-add-member`; the command, `time -p` output and exit
    /// status all land in the member log
    pub fn timed_command(subgroups: u32) -> String {
        let group = if subgroups > 0 { "group0" } else { "allusers" };
        let command = format!("ipa group-add-member --users tuser1 {} --no-members", group);
        format!(
            "echo {cmd} > ~/{log};/usr/bin/time -p {cmd} >> ~/{log} 2>&1;echo $? >> ~/{log}",
            cmd = command,
            log = MEMBER_LOG
        )
    }
}

/// Seconds from the `real` line of `time -p` output
pub fn parse_real_time(log: &str) -> Option<String> {
    log.lines()
        .find_map(|line| line.strip_prefix("real "))
        .map(|rest| rest.trim().to_string())
}

impl Producer for GroupSizeTest {
    fn source(&self) -> &str {
        module_path!()
    }

    fn test(&self) -> &str {
        "GroupSizeTest"
    }
}

#[async_trait]
impl TestPlugin for GroupSizeTest {
    fn custom_logs(&self) -> Vec<String> {
        vec![format!("~/*{}", MEMBER_LOG)]
    }

    async fn run_workload(&mut self, stage: &StageContext<'_>) -> PluginResult<ResultCollection> {
        let ctx = stage.ctx;
        let resources = tokio::fs::canonicalize(&stage.layout.resources).await?;
        stage
            .playbook_checked(
                "groupsize_server_config",
                GROUPSIZE_SERVER_CONFIG_PLAYBOOK,
                &json!({
                    "threads": ctx.threads.unwrap_or_default(),
                    "sizelimit": ctx.sizelimit,
                    "number_of_subgroups": ctx.number_of_subgroups,
                    "resources": resources.display().to_string(),
                    "password": ADMIN_PASSWORD,
                }),
            )
            .await?;

        let server = stage.server()?;
        stage.remote.run_checked(&server, "echo password | kinit admin").await?;
        stage
            .remote
            .run_checked(&server, "ipa user-add --first tim --last user tuser1")
            .await?;

        info!(
            users = ctx.threads.unwrap_or_default(),
            subgroups = ctx.number_of_subgroups,
            "Adding one more member"
        );
        let output = stage
            .remote
            .run(&server, &Self::timed_command(ctx.number_of_subgroups))
            .await?;
        if !output.success() {
            warn!(exit_code = output.exit_code, "Timed group-add-member failed");
        }
        Ok(ResultCollection::new())
    }

    async fn post_process(&mut self, stage: &StageContext<'_>) -> PluginResult<ResultCollection> {
        let ctx = stage.ctx;
        let path = stage.layout.host_dir("server").join(MEMBER_LOG);
        let result = match tokio::fs::read_to_string(&path).await {
            Ok(log) => {
                self.real = parse_real_time(&log);
                TestResult::success(
                    &*self,
                    format!(
                        "Total users {}, subgroups {}, time {}",
                        ctx.threads.unwrap_or_default(),
                        ctx.number_of_subgroups,
                        self.real.as_deref().unwrap_or("None")
                    ),
                )
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                TestResult::error(&*self, format!("File sync/server/{} not found", MEMBER_LOG))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(ResultCollection::from(vec![result]))
    }

    fn measurement(&self) -> Option<Measurement> {
        let secs = self.real.as_deref()?.parse::<f64>().ok()?;
        Some(Measurement {
            execution_time_secs: secs,
            units: 1,
            errors: 0,
        })
    }

    fn archive_name(&self, ctx: &ExecutionContext, server_image: &str) -> String {
        let subgroups = if ctx.number_of_subgroups > 0 {
            format!("{}subgroups-", ctx.number_of_subgroups)
        } else {
            String::new()
        };
        format!(
            "GroupSizeTest-{}-{}-{}threads-{}sizelimit-{}{}real",
            timestamp(),
            server_image,
            ctx.threads.unwrap_or_default(),
            ctx.sizelimit.map_or_else(|| "None".to_string(), |s| s.to_string()),
            subgroups,
            self.real.as_deref().unwrap_or("None")
        )
    }
}
