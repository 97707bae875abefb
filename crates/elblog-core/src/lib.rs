//! Parsing, enrichment and ingestion of load balancer access logs.

pub mod archive;
pub mod config;
pub mod error;
pub mod geo;
pub mod ingestion;
pub mod record;
pub mod source;
pub mod user_agent;

pub use archive::{day_filter, LogArchive};
pub use config::Settings;
pub use error::{PipelineError, Result};
pub use geo::{CountryLookup, GeoResolver, MaxMindCountryLookup};
pub use ingestion::{parse_log_file, FileReport, IngestionDriver, ParsedFile};
pub use record::{LineOutcome, RecordBuilder, COLUMN_RULES};
pub use source::LogFileSource;
pub use user_agent::{UaParserBackend, UserAgentEnricher, UserAgentInfo, UserAgentParse};
