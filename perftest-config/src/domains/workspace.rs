//! Local workspace layout

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directories owned by the running test.
///
/// `sync` and `runner_metadata` are relative to `root`; both are wiped at the
/// start of every run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Working directory holding every run artifact
    pub root: PathBuf,

    /// Per-host fetched logs
    pub sync_dir: String,

    /// Topology descriptions, inventory, playbooks and cloned automation
    pub metadata_dir: String,

    /// Helper scripts uploaded to hosts
    pub resources_dir: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            sync_dir: "sync".to_string(),
            metadata_dir: "runner_metadata".to_string(),
            resources_dir: PathBuf::from("resources"),
        }
    }
}

impl WorkspaceConfig {
    pub fn sync_path(&self) -> PathBuf {
        self.root.join(&self.sync_dir)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(&self.metadata_dir)
    }

    /// Resources resolve against `root` unless given as an absolute path
    pub fn resources_path(&self) -> PathBuf {
        if self.resources_dir.is_absolute() {
            self.resources_dir.clone()
        } else {
            self.root.join(&self.resources_dir)
        }
    }

    /// Same layout rooted somewhere else
    pub fn rooted_at(&self, root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ..self.clone()
        }
    }
}

impl Validatable for WorkspaceConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.sync_dir, "sync_dir", self.domain_name())?;
        validate_required_string(&self.metadata_dir, "metadata_dir", self.domain_name())?;

        if self.sync_dir == self.metadata_dir {
            return Err(self.validation_error("sync_dir and metadata_dir must differ"));
        }
        for name in [&self.sync_dir, &self.metadata_dir] {
            if name.contains('/') || name == ".." {
                return Err(self.validation_error(format!(
                    "'{}' must be a plain directory name",
                    name
                )));
            }
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "workspace"
    }
}
