use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use elblog_bucket::{BucketStore, S3BucketStore};
use elblog_core::{
    day_filter, parse_log_file, GeoResolver, IngestionDriver, LogArchive, MaxMindCountryLookup,
    RecordBuilder, Settings, UaParserBackend, UserAgentEnricher,
};
use elblog_repository::{LogStore, SqliteRepository};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Load balancer access log loader", long_about = None)]
struct Cli {
    /// Human-readable log output instead of JSON
    #[arg(long, global = true)]
    plain_logs: bool,

    /// Overrides DATABASE_URL / ELBLOG_DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Overrides ELBLOG_DATA_DIR
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one day of logs and load them into the database
    Load(LoadArgs),
    /// Create the logs table if it does not exist
    InitDb,
    /// Parse a local log file and print its records as JSON lines
    Parse(ParseArgs),
}

#[derive(Args, Debug)]
struct LoadArgs {
    /// Year of log files (defaults to the current UTC year)
    #[arg(short, long)]
    year: Option<i32>,

    /// Month of log files (defaults to the current UTC month)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=12))]
    month: Option<u32>,

    /// Day of log files (defaults to the current UTC day)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=31))]
    day: Option<u32>,

    /// Only use files already in the data directory
    #[arg(long)]
    offline: bool,

    /// Download files again even when cached locally
    #[arg(long)]
    overwrite: bool,
}

#[derive(Args, Debug)]
struct ParseArgs {
    /// Plain or gzip-compressed log file
    file: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.plain_logs);

    let mut settings = Settings::from_env().context("invalid configuration")?;
    if let Some(url) = cli.database_url {
        settings.database_url = url;
    }
    if let Some(dir) = cli.data_dir {
        settings.data_dir = dir;
    }

    match cli.command {
        Command::Load(args) => load(&settings, args).await,
        Command::InitDb => {
            connect_store(&settings).await?;
            info!(database_url = %settings.database_url, "database initialized");
            Ok(())
        }
        Command::Parse(args) => parse(&settings, args),
    }
}

fn init_tracing(plain: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if plain {
        subscriber.init();
    } else {
        subscriber.json().init();
    }
}

async fn connect_store(settings: &Settings) -> Result<SqliteRepository> {
    let repo = SqliteRepository::connect(&settings.database_url, 1)
        .await
        .with_context(|| format!("failed to open database {}", settings.database_url))?;
    repo.initialize().await.context("failed to create logs table")?;
    Ok(repo)
}

fn record_builder(settings: &Settings) -> Result<RecordBuilder> {
    let geo = MaxMindCountryLookup::open(&settings.geo_db).context("failed to open geo database")?;
    let user_agents = UaParserBackend::from_yaml(&settings.ua_regexes)
        .context("failed to load user agent rules")?;
    Ok(RecordBuilder::new(
        GeoResolver::new(Box::new(geo)),
        UserAgentEnricher::new(Box::new(user_agents)),
    ))
}

async fn load(settings: &Settings, args: LoadArgs) -> Result<()> {
    let filter = day_filter(args.year, args.month, args.day);
    info!(filter = %filter, offline = args.offline, "loading logs");

    let builder = record_builder(settings)?;
    let repo = connect_store(settings).await?;
    let mut driver = IngestionDriver::new(builder, Arc::new(repo));

    if args.offline {
        let archive = LogArchive::new(
            None,
            settings.prefix.clone(),
            settings.data_dir.clone(),
            settings.page_size,
        );
        let files = archive.list_offline(&filter)?;
        if files.is_empty() {
            info!(filter = %filter, "no cached log files for day");
            return Ok(());
        }
        driver.ingest_files(&files).await?;
        return Ok(());
    }

    let bucket: Arc<dyn BucketStore> = Arc::new(
        S3BucketStore::new(settings.s3_config())
            .await
            .context("failed to configure object storage")?,
    );
    let archive = LogArchive::new(
        Some(bucket),
        settings.prefix.clone(),
        settings.data_dir.clone(),
        settings.page_size,
    );

    let keys = archive.list_logfiles(&filter).await?;
    if keys.is_empty() {
        info!(filter = %filter, "no remote log files for day");
        return Ok(());
    }

    let mut inserted = 0;
    let mut duplicates = 0;
    for key in &keys {
        let path = archive.download(key, args.overwrite).await?;
        let report = driver.ingest_file(&path).await?;
        inserted += report.inserted;
        duplicates += report.duplicates;
    }
    info!(files = keys.len(), inserted, duplicates, "load complete");
    Ok(())
}

fn parse(settings: &Settings, args: ParseArgs) -> Result<()> {
    let mut builder = record_builder(settings)?;
    let parsed = parse_log_file(&mut builder, &args.file)
        .with_context(|| format!("failed to parse {}", args.file.display()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for record in &parsed.records {
        writeln!(out, "{}", serde_json::to_string(record)?)?;
    }
    out.flush()?;

    eprintln!("{}", serde_json::to_string(&parsed.report)?);
    Ok(())
}
