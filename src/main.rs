use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cloudview::config::{Config, ProviderConfig};
use cloudview::error::InventoryError;
use cloudview::output::{render, OutputFormat};
use cloudview::provider::{Provider, ProviderFactory, ProviderRegistry};
use cloudview::resource::{FilterInput, Kind};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Read-only inventory of cloud resources
#[derive(Parser, Debug)]
#[command(name = "cloudview", version = cloudview::VERSION, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to <config dir>/cloudview/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level; RUST_LOG takes precedence when set
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List resources matching the filters
    Inventory(InventoryArgs),

    /// Show the current status of one resource
    Status {
        /// Resource id (instance id, bucket name, DB identifier, IAM name or ARN, VPC/SG id)
        id: String,

        #[arg(short, long, default_value = "aws")]
        provider: String,
    },

    /// List resource kinds and their aliases
    Kinds,

    /// List regions a provider supports
    Regions {
        #[arg(short, long, default_value = "aws")]
        provider: String,
    },

    /// Authenticate every enabled provider and report its state
    Providers,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct InventoryArgs {
    #[arg(short, long, default_value = "aws")]
    provider: String,

    /// Regions to scan (comma-separated); `global` selects IAM
    #[arg(short, long, value_delimiter = ',')]
    region: Vec<String>,

    /// Resource kinds or aliases (comma-separated)
    #[arg(short = 't', long = "type", value_delimiter = ',')]
    kinds: Vec<String>,

    /// Tag filter as key=value; repeatable, all must match
    #[arg(long)]
    tag: Vec<String>,

    /// Provider states to keep (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    status: Vec<String>,

    /// Only resources created after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    created_after: Option<String>,

    /// Only resources created before this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    created_before: Option<String>,

    /// Output format (defaults to the configured format)
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration with secrets masked
    Show,
    /// Print the configuration file path
    Path,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    let Some(log_path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .with_target(false)
            .init();
        return Ok(None);
    };

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("cloudview {} started with log level: {:?}", cloudview::VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

/// Effective log level: flag, then config file, then warn
fn resolve_log_level(flag: Option<LogLevel>, config: &Config) -> LogLevel {
    flag.or_else(|| {
        config
            .logging
            .level
            .as_deref()
            .and_then(|level| LogLevel::from_str(level, true).ok())
    })
    .unwrap_or(LogLevel::Warn)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // `config init` must work before any file exists
    let config = match &args.command {
        Command::Config {
            action: ConfigAction::Init { .. },
        } => Config::default(),
        _ => Config::load(args.config.as_deref())?,
    };
    let level = resolve_log_level(args.log_level, &config);
    let log_file = args.log_file.clone().or_else(|| config.logging.file.clone());
    let _log_guard = setup_logging(level, log_file.as_deref())?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    match args.command {
        Command::Inventory(inventory) => run_inventory(&config, inventory, &cancel).await,
        Command::Status { id, provider } => run_status(&config, &provider, &id, &cancel).await,
        Command::Kinds => print_kinds(),
        Command::Regions { provider } => print_regions(&provider),
        Command::Providers => run_providers(&config, &cancel).await,
        Command::Config { action } => run_config(&config, args.config.as_deref(), action),
    }
}

/// Authenticate one provider from configuration and register it
async fn connect(
    factory: &ProviderFactory,
    registry: &ProviderRegistry,
    config: &Config,
    name: &str,
    cancel: &CancellationToken,
) -> Result<Arc<Provider>, InventoryError> {
    let provider_config: ProviderConfig = config
        .provider(name)
        .ok_or_else(|| InventoryError::UnsupportedProvider(name.to_string()))?;

    if !provider_config.enabled() {
        return Err(InventoryError::InvalidConfig(format!(
            "provider '{}' is disabled in configuration",
            name
        )));
    }

    let provider = factory.create_provider(name, &provider_config, cancel).await?;
    registry.register(name, Arc::clone(&provider))?;
    Ok(provider)
}

async fn run_inventory(
    config: &Config,
    args: InventoryArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let filters = FilterInput {
        regions: args.region,
        kinds: args.kinds,
        tags: args.tag,
        statuses: args.status,
        created_after: args.created_after,
        created_before: args.created_before,
    }
    .parse()?;
    let format = args.output.unwrap_or(config.output.format);

    let factory = ProviderFactory::default();
    let registry = ProviderRegistry::new();
    let provider = connect(&factory, &registry, config, &args.provider, cancel).await?;

    let inventory = match filters.kinds.as_slice() {
        [kind] => provider.get_resources_by_type(kind, &filters, cancel).await?,
        _ => provider.get_resources(&filters, cancel).await?,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    render(&inventory, format, &mut out)?;
    out.flush()?;

    if format == OutputFormat::Table {
        for warning in &inventory.warnings {
            eprintln!("warning: {}", warning);
        }
    }
    Ok(())
}

async fn run_status(
    config: &Config,
    provider_name: &str,
    id: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let factory = ProviderFactory::default();
    let registry = ProviderRegistry::new();
    let provider = connect(&factory, &registry, config, provider_name, cancel).await?;

    let status = provider.get_resource_status(id, cancel).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn print_kinds() -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for kind in Kind::ALL.iter().filter(|k| **k != Kind::Unknown) {
        writeln!(
            out,
            "{:<16} {:<18} {}",
            kind.as_str(),
            kind.display_name(),
            kind.aliases().join(", ")
        )?;
    }
    Ok(())
}

fn print_regions(provider_name: &str) -> Result<()> {
    let factory = ProviderFactory::default();
    if !factory.supported_providers().iter().any(|p| *p == provider_name) {
        return Err(InventoryError::UnsupportedProvider(provider_name.to_string()).into());
    }

    // Static metadata only; no credentials needed
    for region in cloudview::aws::SUPPORTED_REGIONS {
        println!("{}", region);
    }
    Ok(())
}

async fn run_providers(config: &Config, cancel: &CancellationToken) -> Result<()> {
    let factory = ProviderFactory::default();
    let registry = ProviderRegistry::new();

    let failures = factory.create_enabled(config, &registry, cancel).await;

    for name in registry.list() {
        let info = registry.info(&name).await?;
        println!(
            "{:<8} {:<16} {} kinds, {} regions  {}",
            info.name,
            if info.authenticated { "authenticated" } else { "unauthenticated" },
            info.supported_kinds.len(),
            info.supported_regions.len(),
            info.description
        );
    }
    for (name, err) in failures {
        println!("{:<8} {:<16} {}", name, "unavailable", err);
    }
    Ok(())
}

fn run_config(config: &Config, explicit: Option<&Path>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init { force } => {
            let path = match explicit {
                Some(p) => p.to_path_buf(),
                None => Config::config_path().context("Could not determine config directory")?,
            };
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            let written = Config::default().save(Some(&path))?;
            println!("Wrote {}", written.display());
        }
        ConfigAction::Show => {
            config.validate()?;
            print!("{}", serde_yaml::to_string(&config.masked())?);
        }
        ConfigAction::Path => match explicit.map(Path::to_path_buf).or_else(Config::config_path) {
            Some(path) => println!("{}", path.display()),
            None => anyhow::bail!("Could not determine config directory"),
        },
    }
    Ok(())
}
