use std::path::PathBuf;

use elblog_bucket::BucketError;
use elblog_parser::ParserError;
use elblog_repository::{ColumnTypeMismatch, RepositoryError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open log file {path}: {source}")]
    OpenSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Object storage error: {0}")]
    Bucket(#[from] BucketError),

    #[error("Log line error: {0}")]
    Parser(#[from] ParserError),

    #[error("Record construction failed: {0}")]
    Column(#[from] ColumnTypeMismatch),

    #[error("Geo database error: {0}")]
    GeoDatabase(String),

    #[error("User agent rules error: {0}")]
    UserAgentRules(String),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
