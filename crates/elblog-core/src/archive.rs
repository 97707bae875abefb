//! Remote log listing and the local download cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use elblog_bucket::BucketStore;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};

/// The `YYYY/MM/DD` key segment for one day of logs. Missing parts are taken
/// from the current UTC date.
pub fn day_filter(year: Option<i32>, month: Option<u32>, day: Option<u32>) -> String {
    day_filter_on(Utc::now().date_naive(), year, month, day)
}

pub fn day_filter_on(
    today: NaiveDate,
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
) -> String {
    format!(
        "{:04}/{:02}/{:02}",
        year.unwrap_or_else(|| today.year()),
        month.unwrap_or_else(|| today.month()),
        day.unwrap_or_else(|| today.day())
    )
}

pub struct LogArchive {
    bucket: Option<Arc<dyn BucketStore>>,
    prefix: String,
    data_dir: PathBuf,
    page_size: i32,
}

impl LogArchive {
    /// `bucket` may be `None` when only already-downloaded files are used.
    pub fn new(
        bucket: Option<Arc<dyn BucketStore>>,
        prefix: impl Into<String>,
        data_dir: impl Into<PathBuf>,
        page_size: i32,
    ) -> Self {
        Self {
            bucket,
            prefix: prefix.into(),
            data_dir: data_dir.into(),
            page_size,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn bucket(&self) -> Result<&Arc<dyn BucketStore>> {
        self.bucket
            .as_ref()
            .ok_or_else(|| PipelineError::Config("no bucket configured for remote listing".into()))
    }

    fn key_prefix(&self, filter: &str) -> String {
        if self.prefix.is_empty() || self.prefix.ends_with('/') {
            format!("{}{filter}", self.prefix)
        } else {
            format!("{}/{filter}", self.prefix)
        }
    }

    /// Every remote key under the configured prefix followed by `filter`.
    pub async fn list_logfiles(&self, filter: &str) -> Result<Vec<String>> {
        let prefix = self.key_prefix(filter);
        let keys = self.bucket()?.list_keys(&prefix, self.page_size).await?;
        info!(prefix = %prefix, entries = keys.len(), "listed remote log files");
        Ok(keys)
    }

    /// Where `key` is cached locally: the key with the configured prefix
    /// removed, under the data directory.
    pub fn local_path(&self, key: &str) -> PathBuf {
        let relative = if self.prefix.is_empty() {
            key
        } else {
            key.strip_prefix(self.prefix.as_str()).unwrap_or(key)
        };
        self.data_dir.join(relative.trim_start_matches('/'))
    }

    /// Fetches `key` into the local cache unless it is already there.
    pub async fn download(&self, key: &str, overwrite: bool) -> Result<PathBuf> {
        let dest = self.local_path(key);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if !overwrite && dest.exists() {
            debug!(key, path = %dest.display(), "using cached log file");
            return Ok(dest);
        }

        info!(key, path = %dest.display(), "downloading log file");
        let bytes = self.bucket()?.get_object(key).await?;
        std::fs::write(&dest, &bytes)?;
        Ok(dest)
    }

    /// Already-downloaded `*.gz` files under `data_dir/filter`, sorted.
    pub fn list_offline(&self, filter: &str) -> Result<Vec<PathBuf>> {
        let dir = self.data_dir.join(filter.trim_matches('/'));
        let pattern = format!("{}/*.gz", glob::Pattern::escape(&dir.to_string_lossy()));

        let mut files = Vec::new();
        for entry in glob::glob(&pattern)? {
            match entry {
                Ok(path) => files.push(path),
                Err(err) => warn!(error = %err, "skipping unreadable cache entry"),
            }
        }
        files.sort();
        info!(dir = %dir.display(), entries = files.len(), "listed cached log files");
        Ok(files)
    }
}
