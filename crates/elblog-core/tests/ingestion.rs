use std::fs::File;
use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use elblog_core::geo::LookupError;
use elblog_core::{
    CountryLookup, GeoResolver, IngestionDriver, PipelineError, RecordBuilder, UaParserBackend,
    UserAgentEnricher,
};
use elblog_repository::{LogStore, SqliteRepository};
use flate2::write::GzEncoder;
use flate2::Compression;

fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../elblog-parser/tests/data")
        .join(name)
}

struct NoCountries;

impl CountryLookup for NoCountries {
    fn country_code(&self, _ip: IpAddr) -> Result<Option<String>, LookupError> {
        Ok(None)
    }
}

async fn driver() -> Result<(IngestionDriver, SqliteRepository)> {
    let repo = SqliteRepository::in_memory().await?;
    repo.initialize().await?;

    let backend = UaParserBackend::from_yaml(fixture_path("ua_regexes.yaml"))?;
    let builder = RecordBuilder::new(
        GeoResolver::new(Box::new(NoCountries)),
        UserAgentEnricher::new(Box::new(backend)),
    );
    let driver = IngestionDriver::new(builder, Arc::new(repo.clone()));
    Ok((driver, repo))
}

#[tokio::test]
async fn sample_ingests_six_rows_and_reprocessing_adds_none() -> Result<()> {
    let (mut driver, repo) = driver().await?;
    let sample = fixture_path("alb_sample.log");

    let first = driver.ingest_file(&sample).await?;
    assert_eq!(first.lines, 6);
    assert_eq!(first.records, 6);
    assert_eq!(first.inserted, 6);
    assert_eq!(first.duplicates, 0);
    assert_eq!(repo.count().await?, 6);

    let second = driver.ingest_file(&sample).await?;
    assert_eq!(second.records, 6);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 6);
    assert_eq!(repo.count().await?, 6);

    let stored = repo
        .fetch_by_id(1_661_299_201_186_641)
        .await?
        .expect("first sample row stored");
    assert_eq!(stored.client_ip, "192.168.131.39");
    assert_eq!(stored.browser_family, "curl");
    Ok(())
}

#[tokio::test]
async fn mixed_file_reports_skipped_lines() -> Result<()> {
    let (mut driver, repo) = driver().await?;

    let report = driver.ingest_file(&fixture_path("alb_mixed.log")).await?;

    assert_eq!(report.lines, 10);
    assert_eq!(report.records, 6);
    assert_eq!(report.no_match, 4);
    assert_eq!(report.invalid, 0);
    assert_eq!(repo.count().await?, 6);
    Ok(())
}

#[tokio::test]
async fn overlapping_files_keep_only_new_rows() -> Result<()> {
    let (mut driver, repo) = driver().await?;

    let reports = driver
        .ingest_files(&[fixture_path("alb_sample.log"), fixture_path("alb_mixed.log")])
        .await?;

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].inserted, 6);
    assert_eq!(reports[1].duplicates, 6);
    assert_eq!(repo.count().await?, 6);
    Ok(())
}

#[tokio::test]
async fn gzip_file_and_invalid_timestamp() -> Result<()> {
    let (mut driver, repo) = driver().await?;
    let sample = std::fs::read_to_string(fixture_path("alb_sample.log"))?;
    let broken = sample
        .lines()
        .next()
        .expect("sample has lines")
        .replace("2022-08-24T00:00:01.186641Z", "2022-08-24T25:61:00Z");

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("2022").join("08").join("24").join("access.log.gz");
    std::fs::create_dir_all(path.parent().expect("has parent"))?;
    let mut encoder = GzEncoder::new(File::create(&path)?, Compression::default());
    writeln!(encoder, "{broken}")?;
    encoder.write_all(sample.as_bytes())?;
    encoder.finish()?;

    let report = driver.ingest_file(&path).await?;

    assert_eq!(report.lines, 7);
    assert_eq!(report.invalid, 1);
    assert_eq!(report.records, 6);
    assert_eq!(report.inserted, 6);
    assert_eq!(repo.count().await?, 6);
    Ok(())
}

#[tokio::test]
async fn parse_file_does_not_touch_store() -> Result<()> {
    let (mut driver, repo) = driver().await?;

    let parsed = driver.parse_file(&fixture_path("alb_sample.log"))?;

    assert_eq!(parsed.records.len(), 6);
    assert_eq!(parsed.report.inserted, 0);
    assert_eq!(repo.count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn missing_file_is_fatal() -> Result<()> {
    let (mut driver, _repo) = driver().await?;

    let err = driver
        .ingest_file(Path::new("/nonexistent/2022/08/24/access.log.gz"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::OpenSource { .. }));
    Ok(())
}
