//! Fan-out of remote commands across hosts
//!
//! Every command is launched at once and the batch is joined as a whole.
//! There is no admission control: the number of commands in flight equals
//! the number of jobs.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::remote::{RemoteExecutor, RemoteOutput, RemoteTarget};

/// One command for one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteJob {
    pub target: RemoteTarget,
    pub command: String,
}

impl RemoteJob {
    pub fn new(target: RemoteTarget, command: impl Into<String>) -> Self {
        Self {
            target,
            command: command.into(),
        }
    }
}

/// Outcome of one job, tied to the host it ran on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub host: String,
    pub output: RemoteOutput,
}

impl JobOutcome {
    pub fn exit_code(&self) -> i32 {
        self.output.exit_code
    }

    pub fn success(&self) -> bool {
        self.output.success()
    }
}

/// Outcomes of a fan-out, in launch order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOut {
    outcomes: Vec<JobOutcome>,
}

impl FanOut {
    pub fn outcomes(&self) -> &[JobOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Exit code per host; with several jobs per host the last one wins
    pub fn by_host(&self) -> BTreeMap<&str, i32> {
        self.outcomes
            .iter()
            .map(|o| (o.host.as_str(), o.exit_code()))
            .collect()
    }

    /// `Host <name> returned <rc>` lines for the audit file
    pub fn returncode_lines(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .map(|o| format!("Host {} returned {}", o.host, o.exit_code()))
            .collect()
    }
}

/// Launch every job, then wait for all of them.
///
/// A job whose command could not be started is reported with exit code -1
/// and the error in `stderr`.
pub async fn fan_out(remote: &dyn RemoteExecutor, jobs: Vec<RemoteJob>) -> FanOut {
    debug!(jobs = jobs.len(), "Launching remote commands");
    let futures = jobs.iter().map(|job| async move {
        let output = match remote.run(&job.target, &job.command).await {
            Ok(output) => output,
            Err(e) => {
                warn!(host = %job.target.name, error = %e, "Remote command could not run");
                RemoteOutput {
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: e.to_string(),
                }
            }
        };
        JobOutcome {
            host: job.target.name.clone(),
            output,
        }
    });

    FanOut {
        outcomes: join_all(futures).await,
    }
}

/// Run jobs one after the other, same reporting as [`fan_out`]
pub async fn run_sequentially(remote: &dyn RemoteExecutor, jobs: Vec<RemoteJob>) -> FanOut {
    let mut outcomes = Vec::with_capacity(jobs.len());
    for job in jobs {
        let single = fan_out(remote, vec![job]).await;
        outcomes.extend(single.outcomes);
    }
    FanOut { outcomes }
}

/// Wall-clock moment at which every host acts together.
///
/// Hosts sleep locally until the target epoch second; this approximates a
/// simultaneous start without any coordination between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPoint {
    epoch: i64,
}

impl SyncPoint {
    pub fn at(epoch: i64) -> Self {
        Self { epoch }
    }

    /// One minute per 30 hosts from `now`, at least one minute
    pub fn for_hosts(now: DateTime<Utc>, hosts: usize) -> Self {
        let minutes = (hosts / 30).max(1) as i64;
        Self::at(now.timestamp() + minutes * 60)
    }

    pub fn epoch(&self) -> i64 {
        self.epoch
    }

    pub fn offset(&self, seconds: i64) -> Self {
        Self::at(self.epoch + seconds)
    }

    /// Shell snippet sleeping until this point
    pub fn sleep_command(&self) -> String {
        format!("sleep $(( {} - $(date +%s) ))", self.epoch)
    }
}
