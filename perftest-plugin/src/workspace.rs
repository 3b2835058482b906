//! Local directories owned by a run

use perftest_config::WorkspaceConfig;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::PluginResult;

/// Resolved workspace paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub root: PathBuf,
    pub sync: PathBuf,
    pub metadata: PathBuf,
    pub resources: PathBuf,
}

impl WorkspaceLayout {
    pub fn from_config(config: &WorkspaceConfig) -> Self {
        Self {
            root: config.root.clone(),
            sync: config.sync_path(),
            metadata: config.metadata_path(),
            resources: config.resources_path(),
        }
    }

    /// Fetched logs of one host
    pub fn host_dir(&self, host: &str) -> PathBuf {
        self.sync.join(host)
    }

    pub fn returncodes_path(&self) -> PathBuf {
        self.sync.join("returncodes")
    }

    pub fn inventory_path(&self) -> PathBuf {
        self.metadata.join("inventory")
    }

    pub fn ansible_cfg_path(&self) -> PathBuf {
        self.metadata.join("ansible.cfg")
    }

    /// Cached facts written by the procedure runner
    pub fn facts_dir(&self) -> PathBuf {
        self.metadata.join("facts")
    }

    /// Generated playbook `name`
    pub fn playbook_path(&self, name: &str) -> PathBuf {
        self.metadata.join(format!("{}.yml", name))
    }

    /// Write the `returncodes` audit file, one line per entry
    pub async fn write_returncodes<I, S>(&self, lines: I) -> PluginResult<PathBuf>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut content = String::new();
        for line in lines {
            content.push_str(line.as_ref());
            content.push('\n');
        }
        let path = self.returncodes_path();
        tokio::fs::create_dir_all(&self.sync).await?;
        tokio::fs::write(&path, content).await?;
        debug!(path = %path.display(), "Return codes written");
        Ok(path)
    }
}

/// Remove `dir` with everything below it and create it empty again.
///
/// A missing directory is not an error.
pub async fn reset_dir(dir: &Path) -> PluginResult<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!(dir = %dir.display(), "Removed previous contents"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}
