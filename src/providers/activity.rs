//! Department activity from the file-based message directory
//!
//! Departments communicate by dropping message files into a shared
//! directory. The newest modification time is the department's last
//! activity; the evaluator turns its age into a status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

use crate::domain::{MetricSnapshot, Payload};
use crate::error::Result;

use super::{settle, MetricProvider};

/// Provider over one department's message directory
pub struct DepartmentActivityProvider {
    source_id: String,
    department: String,
    directory: PathBuf,
}

impl DepartmentActivityProvider {
    pub fn new(source_id: &str, department: &str, directory: impl Into<PathBuf>) -> Self {
        Self {
            source_id: source_id.to_string(),
            department: department.to_string(),
            directory: directory.into(),
        }
    }

    async fn collect(&self) -> Result<MetricSnapshot> {
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(MetricSnapshot::no_data(
                    &self.source_id,
                    format!("message directory {} does not exist", self.directory.display()),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let mut count = 0usize;
        let mut latest: Option<(DateTime<Utc>, String)> = None;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            count += 1;
            let modified: DateTime<Utc> = metadata.modified()?.into();
            if latest.as_ref().map_or(true, |(at, _)| modified > *at) {
                latest = Some((modified, name));
            }
        }

        let Some((last_activity, latest_message)) = latest else {
            return Ok(MetricSnapshot::no_data(
                &self.source_id,
                format!("no messages from {}", self.department),
            ));
        };

        debug!(department = %self.department, count, "scanned message directory");

        let mut payload = Payload::new();
        payload.insert("department".into(), json!(self.department));
        payload.insert("message_count".into(), json!(count));
        payload.insert("latest_message".into(), json!(latest_message));

        Ok(MetricSnapshot::observed(&self.source_id, Utc::now(), payload)
            .with_last_activity(Some(last_activity)))
    }
}

#[async_trait]
impl MetricProvider for DepartmentActivityProvider {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn fetch(&self) -> MetricSnapshot {
        settle(&self.source_id, self.collect().await)
    }
}
