//! Output sinks

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::errors::{OutputError, OutputResult};

/// Where rendered results end up
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Renderers use the standard output variant of their format
    fn is_stdout(&self) -> bool;

    fn describe(&self) -> String;

    async fn write(&self, content: &str) -> OutputResult<()>;
}

/// A file, overwritten on every write
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ResultSink for FileSink {
    fn is_stdout(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn write(&self, content: &str) -> OutputResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| OutputError::Write {
                        target: self.describe(),
                        source,
                    })?;
            }
        }
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|source| OutputError::Write {
                target: self.describe(),
                source,
            })
    }
}

/// The process's standard output
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

#[async_trait]
impl ResultSink for StdoutSink {
    fn is_stdout(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "stdout".to_string()
    }

    async fn write(&self, content: &str) -> OutputResult<()> {
        let mut stdout = tokio::io::stdout();
        let to_error = |source| OutputError::Write {
            target: "stdout".to_string(),
            source,
        };
        stdout.write_all(content.as_bytes()).await.map_err(to_error)?;
        stdout.flush().await.map_err(to_error)
    }
}

/// File sink when a path is given, standard output otherwise
pub fn sink_for(path: Option<PathBuf>) -> Box<dyn ResultSink> {
    match path {
        Some(path) => Box::new(FileSink::new(path)),
        None => Box::new(StdoutSink),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_sink_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.json");
        let sink = FileSink::new(&path);

        sink.write("first run, longer content").await.unwrap();
        sink.write("[]").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
        assert!(!sink.is_stdout());
    }

    #[test]
    fn test_sink_selection() {
        assert!(sink_for(None).is_stdout());
        let file = sink_for(Some(PathBuf::from("out.txt")));
        assert!(!file.is_stdout());
        assert_eq!(file.describe(), "out.txt");
    }
}
