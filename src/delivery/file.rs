use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::render::{Format, RenderedDocument};

use super::{DeliveryAdapter, DeliveryResult, RetryPolicy};

/// Writes reports into a directory.
///
/// Each pass lands in `<prefix>_<YYYYmmdd_HHMMSS>.<ext>`, and
/// `<prefix>_latest.<ext>` is replaced atomically so readers never see a
/// partial file.
pub struct FileSink {
    name: String,
    format: Format,
    directory: PathBuf,
    prefix: String,
    keep: Option<usize>,
    retry: RetryPolicy,
}

impl FileSink {
    pub fn new(name: &str, format: Format, directory: impl Into<PathBuf>, prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            format,
            directory: directory.into(),
            prefix: prefix.to_string(),
            keep: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Keep only the newest `keep` timestamped reports
    pub fn with_retention(mut self, keep: Option<usize>) -> Self {
        self.keep = keep;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn latest_path(&self) -> PathBuf {
        self.directory
            .join(format!("{}_latest.{}", self.prefix, self.format.extension()))
    }

    fn archive_path(&self, document: &RenderedDocument) -> PathBuf {
        self.directory.join(format!(
            "{}_{}.{}",
            self.prefix,
            document.generated_at.format("%Y%m%d_%H%M%S"),
            self.format.extension()
        ))
    }

    async fn write(&self, document: &RenderedDocument) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.directory).await?;

        let archive = self.archive_path(document);
        write_atomic(&archive, &document.content).await?;
        write_atomic(&self.latest_path(), &document.content).await?;

        if let Some(keep) = self.keep {
            self.prune(keep).await?;
        }
        Ok(archive)
    }

    /// Delete the oldest timestamped reports beyond `keep`
    async fn prune(&self, keep: usize) -> std::io::Result<()> {
        let latest = self.latest_path();
        let head = format!("{}_", self.prefix);
        let tail = format!(".{}", self.format.extension());

        let mut archived = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if path != latest && name.starts_with(&head) && name.ends_with(&tail) {
                archived.push(path);
            }
        }

        // Timestamped names sort chronologically
        archived.sort();
        let excess = archived.len().saturating_sub(keep);
        for path in archived.into_iter().take(excess) {
            debug!(path = %path.display(), "pruning old report");
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "failed to prune report");
            }
        }
        Ok(())
    }
}

async fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await
}

#[async_trait]
impl DeliveryAdapter for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> Format {
        self.format
    }

    async fn deliver(&self, document: &RenderedDocument) -> DeliveryResult {
        let result = self
            .retry
            .run(&self.name, || async {
                self.write(document).await.map(|_| ()).map_err(|e| e.to_string())
            })
            .await;

        if result.is_delivered() {
            info!(sink = %self.name, path = %self.latest_path().display(), "report written");
        }
        result
    }
}
