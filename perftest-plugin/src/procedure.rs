//! Declarative procedures (Ansible playbooks and ad-hoc modules)

use async_trait::async_trait;
use perftest_provider::{CommandRunner, CommandSpec};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{PluginError, PluginResult};
use crate::remote::RemoteAccess;
use crate::workspace::WorkspaceLayout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcedureKind {
    /// Playbook file, absolute or relative to the metadata directory
    Playbook(PathBuf),
    /// Ad-hoc module run against a host pattern
    Module {
        module: String,
        args: Option<String>,
        pattern: String,
    },
}

/// One procedure invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Procedure {
    /// Used in logs and errors
    pub name: String,
    pub kind: ProcedureKind,
    /// Restrict the run to this host or group
    pub limit: Option<String>,
}

impl Procedure {
    pub fn playbook(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: ProcedureKind::Playbook(path.into()),
            limit: None,
        }
    }

    pub fn module(module: impl Into<String>, pattern: impl Into<String>) -> Self {
        let module = module.into();
        Self {
            name: module.clone(),
            kind: ProcedureKind::Module {
                module,
                args: None,
                pattern: pattern.into(),
            },
            limit: None,
        }
    }

    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        if let ProcedureKind::Module { args: current, .. } = &mut self.kind {
            *current = Some(args.into());
        }
        self
    }

    pub fn with_limit(mut self, limit: impl Into<String>) -> Self {
        self.limit = Some(limit.into());
        self
    }
}

/// Completion signal, captured output and cached facts of a procedure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcedureOutcome {
    pub success: bool,
    pub output: String,
    /// Facts per inventory host name
    pub facts: BTreeMap<String, Map<String, Value>>,
}

impl ProcedureOutcome {
    pub fn fact(&self, host: &str, key: &str) -> Option<&Value> {
        self.facts.get(host).and_then(|facts| facts.get(key))
    }

    /// Fact rendered as trimmed text, numbers included
    pub fn fact_text(&self, host: &str, key: &str) -> Option<String> {
        self.fact(host, key).map(|value| match value {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
    }

    /// Turn an unsuccessful outcome into an error
    pub fn into_checked(self, name: &str) -> PluginResult<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(PluginError::procedure_failed(name, tail(&self.output, 20)))
        }
    }
}

/// Last `lines` lines of `text`
fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// Runs procedures against the generated inventory
#[async_trait]
pub trait ProcedureRunner: Send + Sync {
    async fn run(&self, procedure: &Procedure) -> PluginResult<ProcedureOutcome>;

    async fn run_checked(&self, procedure: &Procedure) -> PluginResult<ProcedureOutcome> {
        self.run(procedure).await?.into_checked(&procedure.name)
    }
}

/// `ansible-playbook` / `ansible` through the local command runner
pub struct AnsibleRunner {
    runner: Arc<dyn CommandRunner>,
    layout: WorkspaceLayout,
    access: RemoteAccess,
}

impl AnsibleRunner {
    pub fn new(runner: Arc<dyn CommandRunner>, layout: WorkspaceLayout, access: RemoteAccess) -> Self {
        Self {
            runner,
            layout,
            access,
        }
    }

    pub fn command(&self, procedure: &Procedure) -> CommandSpec {
        let inventory = self.layout.inventory_path().display().to_string();
        let mut spec = match &procedure.kind {
            ProcedureKind::Playbook(path) => CommandSpec::new("ansible-playbook")
                .args(["-v", "-i", inventory.as_str()])
                .arg(path.display().to_string())
                .arg("--flush-cache"),
            ProcedureKind::Module {
                module,
                args,
                pattern,
            } => {
                let spec = CommandSpec::new("ansible")
                    .args(["-i", inventory.as_str()])
                    .arg(pattern)
                    .args(["-m", module.as_str()]);
                match args {
                    Some(args) => spec.args(["-a", args.as_str()]),
                    None => spec,
                }
            }
        };

        if let Some(limit) = &procedure.limit {
            spec = spec.args(["--limit", limit.as_str()]);
        }
        if let Some(ssh_config) = &self.access.ssh_config {
            spec = spec
                .arg("--ssh-extra-args")
                .arg(format!("-F {}", ssh_config.display()));
        }
        spec.arg("--private-key")
            .arg(self.access.private_key.display().to_string())
            .args(["-u", self.access.user.as_str()])
            .current_dir(&self.layout.metadata)
            .env(
                "ANSIBLE_CONFIG",
                self.layout.ansible_cfg_path().display().to_string(),
            )
            .env("ANSIBLE_HOST_KEY_CHECKING", "False")
    }

    /// Facts cached by the jsonfile cache plugin, one file per host
    async fn read_facts(&self) -> PluginResult<BTreeMap<String, Map<String, Value>>> {
        let mut facts = BTreeMap::new();
        let dir = self.layout.facts_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(facts),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let host = entry.file_name().to_string_lossy().into_owned();
            let content = tokio::fs::read_to_string(entry.path()).await?;
            match serde_json::from_str::<Map<String, Value>>(&content) {
                Ok(map) => {
                    facts.insert(host, map);
                }
                Err(e) => warn!(host = %host, error = %e, "Ignoring unreadable fact cache"),
            }
        }
        Ok(facts)
    }
}

#[async_trait]
impl ProcedureRunner for AnsibleRunner {
    async fn run(&self, procedure: &Procedure) -> PluginResult<ProcedureOutcome> {
        info!(procedure = %procedure.name, limit = ?procedure.limit, "Running procedure");
        let output = self.runner.run(&self.command(procedure)).await?;
        debug!(
            procedure = %procedure.name,
            status = output.status,
            "Procedure finished"
        );

        let mut text = output.stdout;
        text.push_str(&output.stderr);
        Ok(ProcedureOutcome {
            success: output.status == 0,
            output: text,
            facts: self.read_facts().await?,
        })
    }
}
