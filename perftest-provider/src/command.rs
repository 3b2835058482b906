//! External program execution

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// A program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured outcome of a finished program
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code; `-1` when the process was killed by a signal
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs external programs to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> ProviderResult<CommandOutput>;

    /// Run and turn a non-zero exit into an error
    async fn run_checked(&self, spec: &CommandSpec) -> ProviderResult<CommandOutput> {
        let output = self.run(spec).await?;
        if !output.success() {
            return Err(ProviderError::command_failed(spec, &output));
        }
        Ok(output)
    }
}

/// Runs programs on the local machine with `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> ProviderResult<CommandOutput> {
        debug!(command = %spec, cwd = ?spec.cwd, "Running command");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        let output = cmd.output().await.map_err(|source| ProviderError::Spawn {
            command: spec.to_string(),
            source,
        })?;

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_display() {
        let spec = CommandSpec::new("vagrant").args(["up", "--parallel"]);
        assert_eq!(spec.to_string(), "vagrant up --parallel");
    }

    #[tokio::test]
    async fn test_system_runner_captures_output() {
        let runner = SystemCommandRunner::new();
        let output = runner
            .run(&CommandSpec::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]))
            .await
            .unwrap();
        assert_eq!(output.status, 3);
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_run_checked_reports_failure() {
        let runner = SystemCommandRunner::new();
        let err = runner
            .run_checked(&CommandSpec::new("sh").args(["-c", "echo broken >&2; exit 1"]))
            .await
            .unwrap_err();
        match err {
            ProviderError::CommandFailed { status, stderr, .. } => {
                assert_eq!(status, 1);
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let runner = SystemCommandRunner::new();
        let err = runner
            .run(&CommandSpec::new("definitely-not-a-real-program-xyz"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_env_and_cwd_applied() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SystemCommandRunner::new();
        let output = runner
            .run(
                &CommandSpec::new("sh")
                    .args(["-c", "echo $PERFTEST_PROBE; pwd"])
                    .env("PERFTEST_PROBE", "value")
                    .current_dir(dir.path()),
            )
            .await
            .unwrap();
        let mut lines = output.stdout.lines();
        assert_eq!(lines.next(), Some("value"));
        let cwd = std::path::PathBuf::from(lines.next().unwrap());
        assert_eq!(
            cwd.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }
}
