//! Compressed archive of run artifacts

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PluginError, PluginResult};

/// Write `<root>/<name>.tar.gz` holding every existing entry.
///
/// Entries are stored relative to `root`; missing ones are skipped.
pub async fn create_archive(root: &Path, name: &str, entries: &[PathBuf]) -> PluginResult<PathBuf> {
    let root = root.to_path_buf();
    let path = root.join(format!("{}.tar.gz", name));
    let entries = entries.to_vec();
    let target = path.clone();

    tokio::task::spawn_blocking(move || write_archive(&root, &target, &entries))
        .await
        .map_err(|e| PluginError::archive(e.to_string()))??;

    info!(archive = %path.display(), "Run artifacts archived");
    Ok(path)
}

fn write_archive(root: &Path, target: &Path, entries: &[PathBuf]) -> PluginResult<()> {
    let file = File::create(target)?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    for entry in entries {
        if !entry.exists() {
            debug!(entry = %entry.display(), "Not archiving missing entry");
            continue;
        }
        let name = entry.strip_prefix(root).unwrap_or(entry);
        let name = if name.is_absolute() {
            name.strip_prefix("/").unwrap_or(name)
        } else {
            name
        };
        if entry.is_dir() {
            builder.append_dir_all(name, entry)?;
        } else {
            builder.append_path_with_name(entry, name)?;
        }
    }

    builder.into_inner()?.finish()?;
    Ok(())
}

/// Archive base names embed the start time as `2024-05-01T1030Z`
pub fn timestamp() -> String {
    chrono::Utc::now().format("%FT%H%MZ").to_string()
}
