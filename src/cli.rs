use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use weather_dashboard::{
    find_config_file, load_config, ConfigSource, DateBound, DocumentSource, FileDocumentSource,
    HttpDocumentSource, MongoDocumentSource, DEFAULT_COLLECTION, DEFAULT_DATABASE,
    DEFAULT_PREVIEW_LIMIT, DEFAULT_TIMEOUT,
};

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Clone, Debug, Deserialize, Default)]
#[command(
    author,
    version,
    about = "Weather Dashboard - summarizes weather observations from a document store"
)]
pub struct Cli {
    /// Path to config file (TOML format)
    /// Searched in order: this flag, $WEATHER_DASHBOARD_CONFIG, ./dashboard.toml,
    /// <user config dir>/weather-dashboard/dashboard.toml
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, env = "WEATHER_DASHBOARD_LEVEL")]
    pub level: Option<String>,

    /// MongoDB connection string, document store API URL, export URL, or path to an
    /// exported JSON/NDJSON file
    #[arg(short, long, env = "WEATHER_DASHBOARD_SOURCE")]
    pub source: Option<String>,

    /// Database holding the observations
    #[arg(long, env = "WEATHER_DASHBOARD_DATABASE")]
    pub database: Option<String>,

    /// Collection holding the observations
    #[arg(long, env = "WEATHER_DASHBOARD_COLLECTION")]
    pub collection: Option<String>,

    /// Connect and request timeout for the document store, in milliseconds
    #[arg(long, env = "WEATHER_DASHBOARD_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// API key sent to the document store
    #[arg(long, env = "WEATHER_DASHBOARD_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Location key to include, e.g. "52.1,5.18". Repeat for more; all when omitted
    #[arg(long = "station")]
    #[serde(default)]
    pub stations: Vec<String>,

    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,

    /// Number of filtered rows to show
    #[arg(long, env = "WEATHER_DASHBOARD_PREVIEW_LIMIT")]
    pub preview_limit: Option<usize>,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Print the available stations and date range instead of rendering
    #[arg(long)]
    #[serde(skip)]
    pub controls: bool,
}

impl Cli {
    pub fn source(&self) -> anyhow::Result<&str> {
        self.source.as_deref().ok_or_else(|| {
            anyhow!("No data source configured; pass --source or set WEATHER_DASHBOARD_SOURCE")
        })
    }

    pub fn database(&self) -> String {
        self.database
            .clone()
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string())
    }

    pub fn collection(&self) -> String {
        self.collection
            .clone()
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn preview_limit(&self) -> usize {
        self.preview_limit.unwrap_or(DEFAULT_PREVIEW_LIMIT)
    }

    pub fn format(&self) -> OutputFormat {
        self.format.unwrap_or_default()
    }

    /// Selected stations, or `None` for all of them.
    pub fn stations(&self) -> Option<Vec<String>> {
        (!self.stations.is_empty()).then(|| self.stations.clone())
    }

    pub fn start_bound(&self) -> anyhow::Result<Option<DateBound>> {
        parse_bound("--from", self.from.as_deref())
    }

    pub fn end_bound(&self) -> anyhow::Result<Option<DateBound>> {
        parse_bound("--to", self.to.as_deref())
    }
}

fn parse_bound(flag: &str, text: Option<&str>) -> anyhow::Result<Option<DateBound>> {
    text.map(|t| {
        DateBound::parse(t).ok_or_else(|| anyhow!("Invalid {} value '{}', expected YYYY-MM-DD", flag, t))
    })
    .transpose()
}

/// Load configuration from CLI args, config file, and environment
pub fn get_config_info() -> anyhow::Result<Cli> {
    merge_config(Cli::parse())
}

fn merge_config(cli_args: Cli) -> anyhow::Result<Cli> {
    let source = if let Some(ref path) = cli_args.config {
        ConfigSource::Explicit(path.into())
    } else {
        find_config_file()
    };

    let file_config: Cli =
        load_config(&source).with_context(|| format!("Loading configuration from {}", source))?;

    // CLI args override file config (env vars are handled by clap)
    Ok(Cli {
        config: cli_args.config,
        level: cli_args.level.or(file_config.level),
        source: cli_args.source.or(file_config.source),
        database: cli_args.database.or(file_config.database),
        collection: cli_args.collection.or(file_config.collection),
        timeout_ms: cli_args.timeout_ms.or(file_config.timeout_ms),
        api_key: cli_args.api_key.or(file_config.api_key),
        stations: if cli_args.stations.is_empty() {
            file_config.stations
        } else {
            cli_args.stations
        },
        from: cli_args.from.or(file_config.from),
        to: cli_args.to.or(file_config.to),
        preview_limit: cli_args.preview_limit.or(file_config.preview_limit),
        format: cli_args.format.or(file_config.format),
        controls: cli_args.controls,
    })
}

/// Builds the document source named by `--source`.
///
/// `mongodb://` and `mongodb+srv://` connection strings go to the MongoDB driver,
/// `http://` and `https://` URLs to the HTTP source, anything else is a file path.
pub async fn build_source(cli: &Cli) -> anyhow::Result<Box<dyn DocumentSource>> {
    let source = cli.source()?;
    if source.starts_with("mongodb://") || source.starts_with("mongodb+srv://") {
        // Without --timeout-ms the connection string's own timeout applies.
        let mongo = MongoDocumentSource::builder()
            .uri(source)
            .database(&cli.database())
            .collection(&cli.collection())
            .maybe_timeout(cli.timeout_ms.map(Duration::from_millis))
            .build()
            .await?;
        Ok(Box::new(mongo))
    } else if source.starts_with("http://") || source.starts_with("https://") {
        let http = HttpDocumentSource::builder()
            .url(source)
            .database(&cli.database())
            .collection(&cli.collection())
            .timeout(cli.timeout())
            .maybe_api_key(cli.api_key.clone())
            .build()?;
        Ok(Box::new(http))
    } else {
        Ok(Box::new(FileDocumentSource::new(source)))
    }
}

pub fn get_log_level(cli: &Cli) -> LevelFilter {
    let level_str = cli
        .level
        .clone()
        .or_else(|| env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());

    match level_str.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Logs go to stderr so that stdout carries only the rendered dashboard.
pub fn setup_logger(level: LevelFilter) -> fern::Dispatch {
    let colors = ColoredLevelConfig::new()
        .trace(Color::White)
        .debug(Color::Cyan)
        .info(Color::Blue)
        .warn(Color::Yellow)
        .error(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}: {}",
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                colors.color(record.level()),
                record.target(),
                message
            ));
        })
        .level(level)
        .chain(std::io::stderr())
}
