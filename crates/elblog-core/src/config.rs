use std::path::PathBuf;

use elblog_bucket::S3Config;

use crate::error::{PipelineError, Result};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://analysis/logs.sqlite3";
pub const DEFAULT_GEO_DB: &str = "geo/GeoLite2-Country.mmdb";
pub const DEFAULT_UA_REGEXES: &str = "geo/regexes.yaml";
pub const DEFAULT_DATA_DIR: &str = "logs";
pub const DEFAULT_BUCKET: &str = "elb-logs";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_PAGE_SIZE: i32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub geo_db: PathBuf,
    pub ua_regexes: PathBuf,
    pub data_dir: PathBuf,
    pub bucket: String,
    pub prefix: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub page_size: i32,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable source. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let page_size = match get("ELBLOG_S3_PAGE_SIZE") {
            Some(raw) => match raw.trim().parse::<i32>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(PipelineError::Config(format!(
                        "ELBLOG_S3_PAGE_SIZE must be a positive integer, got '{raw}'"
                    )))
                }
            },
            None => DEFAULT_PAGE_SIZE,
        };

        Ok(Self {
            database_url: get("DATABASE_URL")
                .or_else(|| get("ELBLOG_DATABASE_URL"))
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            geo_db: get("ELBLOG_GEO_DB")
                .unwrap_or_else(|| DEFAULT_GEO_DB.to_string())
                .into(),
            ua_regexes: get("ELBLOG_UA_REGEXES")
                .unwrap_or_else(|| DEFAULT_UA_REGEXES.to_string())
                .into(),
            data_dir: get("ELBLOG_DATA_DIR")
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
                .into(),
            bucket: get("ELBLOG_S3_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            prefix: get("ELBLOG_S3_PREFIX").unwrap_or_default(),
            region: get("ELBLOG_S3_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            endpoint: get("ELBLOG_S3_ENDPOINT"),
            access_key_id: get("ELBLOG_S3_ACCESS_KEY_ID"),
            secret_access_key: get("ELBLOG_S3_SECRET_ACCESS_KEY"),
            page_size,
        })
    }

    pub fn s3_config(&self) -> S3Config {
        S3Config {
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            force_path_style: self.endpoint.is_some(),
        }
    }
}
