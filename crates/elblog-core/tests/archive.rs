use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use elblog_bucket::{BucketError, BucketStore};
use elblog_core::{LogArchive, PipelineError};

const PREFIX: &str = "production/AWSLogs/123456789012/elasticloadbalancing/us-east-1/";

#[derive(Default)]
struct MemoryBucket {
    objects: BTreeMap<String, Bytes>,
    gets: AtomicUsize,
    pages: AtomicUsize,
}

impl MemoryBucket {
    fn with(keys: &[&str]) -> Self {
        let objects = keys
            .iter()
            .map(|key| (key.to_string(), Bytes::from(format!("contents of {key}"))))
            .collect();
        Self {
            objects,
            ..Self::default()
        }
    }
}

#[async_trait]
impl BucketStore for MemoryBucket {
    async fn list_keys(&self, prefix: &str, page_size: i32) -> Result<Vec<String>, BucketError> {
        let keys: Vec<String> = self
            .objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        let page_size = usize::try_from(page_size).unwrap_or(1).max(1);
        self.pages
            .fetch_add(keys.len().div_ceil(page_size), Ordering::SeqCst);
        Ok(keys)
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, BucketError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| BucketError::NotFound(key.to_string()))
    }
}

fn bucket() -> Arc<MemoryBucket> {
    Arc::new(MemoryBucket::with(&[
        format!("{PREFIX}2022/08/23/a.log.gz").as_str(),
        format!("{PREFIX}2022/08/24/b.log.gz").as_str(),
        format!("{PREFIX}2022/08/24/c.log.gz").as_str(),
        format!("{PREFIX}2022/08/24/d.log.gz").as_str(),
    ]))
}

fn remote(bucket: &Arc<MemoryBucket>) -> Option<Arc<dyn BucketStore>> {
    let store: Arc<dyn BucketStore> = bucket.clone();
    Some(store)
}

#[tokio::test]
async fn lists_only_requested_day() -> Result<()> {
    let bucket = bucket();
    let dir = tempfile::tempdir()?;
    let archive = LogArchive::new(remote(&bucket), PREFIX, dir.path(), 2);

    let keys = archive.list_logfiles("2022/08/24").await?;

    assert_eq!(keys.len(), 3);
    assert!(keys.iter().all(|key| key.contains("/2022/08/24/")));
    assert_eq!(bucket.pages.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn download_is_skipped_when_cached() -> Result<()> {
    let bucket = bucket();
    let dir = tempfile::tempdir()?;
    let archive = LogArchive::new(remote(&bucket), PREFIX, dir.path(), 1000);
    let key = format!("{PREFIX}2022/08/24/b.log.gz");

    let path = archive.download(&key, false).await?;
    assert_eq!(path, dir.path().join("2022/08/24/b.log.gz"));
    assert_eq!(std::fs::read_to_string(&path)?, format!("contents of {key}"));

    archive.download(&key, false).await?;
    assert_eq!(bucket.gets.load(Ordering::SeqCst), 1);

    archive.download(&key, true).await?;
    assert_eq!(bucket.gets.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn missing_object_is_an_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let archive = LogArchive::new(remote(&bucket()), PREFIX, dir.path(), 1000);

    let err = archive
        .download(&format!("{PREFIX}2022/08/25/z.log.gz"), false)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Bucket(BucketError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn offline_listing_reads_cache_only() -> Result<()> {
    let bucket = bucket();
    let dir = tempfile::tempdir()?;
    let online = LogArchive::new(remote(&bucket), PREFIX, dir.path(), 1000);
    for key in online.list_logfiles("2022/08/24").await? {
        online.download(&key, false).await?;
    }
    std::fs::write(dir.path().join("2022/08/24/notes.txt"), "not a log")?;

    let offline = LogArchive::new(None, PREFIX, dir.path(), 1000);
    let files = offline.list_offline("2022/08/24")?;

    let names: Vec<String> = files
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["b.log.gz", "c.log.gz", "d.log.gz"]);
    assert!(offline.list_offline("2022/08/23")?.is_empty());
    Ok(())
}

#[tokio::test]
async fn remote_listing_needs_a_bucket() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let archive = LogArchive::new(None, PREFIX, dir.path(), 1000);

    let err = archive.list_logfiles("2022/08/24").await.unwrap_err();

    assert!(matches!(err, PipelineError::Config(_)));
    Ok(())
}
