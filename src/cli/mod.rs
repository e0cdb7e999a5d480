//! Command-line interface for tallyman.
//!
//! Every command opens the configured store, runs one operation through the
//! metric service and closes the store again, so a memory backend always
//! leaves a final snapshot behind.

use crate::core::config::ConfigBuilder;
use crate::core::{Config, Metric, MetricKind, MetricPayload, Result, TallymanError};
use crate::service::MetricService;
use crate::storage::StorageManager;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;

/// Metrics aggregation store for gauges and counters.
#[derive(Parser, Debug)]
#[command(name = "tallyman")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/tallyman/config.yaml)
    #[arg(short, long, env = "TALLYMAN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Relational store DSN; selects the durable backend
    #[arg(long, env = "DATABASE_DSN", global = true)]
    pub database_dsn: Option<String>,

    /// Snapshot file of the memory backend
    #[arg(long, env = "FILE_STORAGE_PATH", global = true)]
    pub file_storage_path: Option<PathBuf>,

    /// Snapshot delay, in seconds or as a duration like `30s`; 0 writes synchronously
    #[arg(long, env = "STORE_INTERVAL", value_parser = parse_interval, global = true)]
    pub store_interval: Option<Duration>,

    /// Restore the memory backend from its snapshot at startup
    #[arg(long, env = "RESTORE", global = true)]
    pub restore: Option<bool>,

    /// Enable debug logging
    #[arg(short, long, env = "TALLYMAN_DEBUG", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Record one metric and print the stored value
    Update {
        /// `gauge` or `counter`
        kind: String,
        id: String,
        value: String,
    },
    /// Record a JSON array of metrics from a file, or `-` for stdin
    Updates { input: PathBuf },
    /// Print the current value of a metric
    Value { kind: String, id: String },
    /// Print every stored metric as JSON
    List,
    /// Check that the backend is reachable
    Ping,
    /// Validate the effective configuration and print it
    CheckConfig,
}

fn parse_interval(raw: &str) -> std::result::Result<Duration, String> {
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime_serde::re::humantime::parse_duration(raw).map_err(|e| e.to_string())
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments and environment variables (highest priority)
    /// 2. Config file
    /// 3. Defaults (lowest priority)
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let config_path = match &self.config {
            Some(path) => path.clone(),
            None => match dirs::config_dir().map(|d| d.join("tallyman").join("config.yaml")) {
                Some(path) if path.exists() => path,
                _ => return self.build_config_from_args(builder),
            },
        };

        match tokio::fs::read_to_string(&config_path).await {
            Ok(content) => {
                builder = builder.from_yaml(&content)?;
                tracing::debug!(path = %config_path.display(), "loaded configuration file");
            },
            Err(e) if self.config.is_some() => {
                return Err(TallymanError::config(format!(
                    "Failed to read config file {}: {}",
                    config_path.display(),
                    e
                )));
            },
            Err(_) => {
                tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            },
        }

        self.build_config_from_args(builder)
    }

    fn build_config_from_args(&self, mut builder: ConfigBuilder) -> Result<Config> {
        if let Some(dsn) = &self.database_dsn {
            builder = builder.database_dsn(dsn.as_str());
        }
        if let Some(path) = &self.file_storage_path {
            builder = builder.file_storage_path(path.clone());
        }
        if let Some(interval) = self.store_interval {
            builder = builder.store_interval(interval);
        }
        if let Some(restore) = self.restore {
            builder = builder.restore(restore);
        }

        builder.debug(self.debug).build()
    }

    /// Initialize logging. `RUST_LOG` wins over the configured level.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let level = if config.debug {
            "debug"
        } else {
            config.logging.level.as_str()
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        // stdout carries command output
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TallymanError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Execute one tallyman command.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;
    cli.init_logging(&config)?;

    if let Command::CheckConfig = cli.command {
        return check_config(&config);
    }

    let manager = StorageManager::from_config(&config).await?;
    let service = MetricService::new(manager.backend()?);

    let outcome = run(&service, cli.command).await;
    let closed = manager.close().await;
    if let Err(e) = &closed {
        tracing::error!(error = %e, "failed to close storage");
    }

    outcome.and(closed)
}

async fn run(service: &MetricService, command: Command) -> Result<()> {
    match command {
        Command::Update { kind, id, value } => {
            let stored = service.save(Metric::parse(&kind, &id, &value)?).await?;
            println!("{}", stored.display_value());
        },
        Command::Updates { input } => {
            let metrics = read_batch(&input).await?;
            service.load(&metrics).await?;
            tracing::info!(count = metrics.len(), "batch stored");
        },
        Command::Value { kind, id } => {
            let kind: MetricKind = kind.parse()?;
            println!("{}", service.value(kind, &id).await?);
        },
        Command::List => {
            let mut metrics = service.get_all().await?;
            metrics.sort_by(|a, b| a.key().cmp(&b.key()));
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        },
        Command::Ping => {
            service.ping().await?;
            println!("ok");
        },
        // handled before storage is opened
        Command::CheckConfig => {},
    }
    Ok(())
}

/// Reads and validates a JSON array of metric payloads. Nothing is stored
/// unless every payload is valid.
async fn read_batch(input: &Path) -> Result<Vec<Metric>> {
    let raw = if input == Path::new("-") {
        let mut buffer = String::new();
        tokio::io::stdin().read_to_string(&mut buffer).await?;
        buffer
    } else {
        tokio::fs::read_to_string(input).await?
    };

    let payloads: Vec<MetricPayload> = serde_json::from_str(&raw)?;
    payloads
        .into_iter()
        .map(|payload| {
            MetricService::validate(&payload)?;
            Metric::try_from(payload)
        })
        .collect()
}

fn check_config(config: &Config) -> Result<()> {
    config.validate()?;
    println!("Configuration is valid!");
    match &config.storage.database_dsn {
        Some(_) => println!("  Backend: database"),
        None => {
            println!("  Backend: memory");
            if let Some(path) = &config.storage.file_storage_path {
                println!("  Snapshot: {}", path.display());
            }
            println!(
                "  Store interval: {}",
                humantime_serde::re::humantime::format_duration(config.storage.store_interval)
            );
            println!("  Restore: {}", config.storage.restore);
        },
    }
    println!("  Retry attempts: {}", config.retry.max_attempts);
    Ok(())
}
