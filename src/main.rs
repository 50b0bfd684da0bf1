use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use lib_updater::config::{self, UpdaterConfig};
use lib_updater::logging::init_logging;
use lib_updater::updater::Synchronizer;
use lib_updater::version::record::VersionRecord;
use lib_updater::version::store::{load_record, save_record};

#[derive(Parser)]
#[command(name = "lib-updater")]
#[command(version, about = "Keeps a library directory in sync with a published version")]
struct Cli {
    /// Configuration file (defaults to the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override a configuration value, e.g. --set platform=Windows
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value, global = true)]
    overrides: Vec<(String, String)>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report whether an update is needed
    Check,
    /// Install the published version if needed
    Update {
        /// Install even if the libraries are up to date
        #[arg(long)]
        force: bool,
    },
    /// Show the installed version record
    Status,
    /// Write an empty version record if none exists
    Init,
    /// Print the effective configuration
    Config,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(config::config_path);
    let mut config = UpdaterConfig::load(&config_path)?;
    config.apply(
        cli.overrides
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str())),
    )?;

    let _guard = init_logging(&config::log_path(), &config.log_level)
        .context("failed to initialize logging")?;
    info!("Using configuration {:?}", config_path);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli.command, config))
}

async fn run(command: Command, config: UpdaterConfig) -> anyhow::Result<()> {
    match command {
        Command::Check => {
            let mut updater = Synchronizer::from_config(&config)?;
            if updater.is_necessary_to_update(true).await? {
                if let (Some(current), Some(online)) =
                    (updater.current_version(), updater.online_version())
                {
                    warn_if_not_newer(current, online);
                }
                println!(
                    "update available: {} -> {}",
                    version_of(updater.current_version()),
                    version_of(updater.online_version())
                );
            } else {
                println!("up to date: {}", version_of(updater.current_version()));
            }
        }
        Command::Update { force } => {
            let mut updater = Synchronizer::from_config(&config)?;
            if force {
                let record = updater.update(true).await?;
                println!("installed {record}");
            } else if updater.update_if_necessary(true).await? {
                println!("installed {}", version_of(updater.current_version()));
            } else {
                println!("up to date: {}", version_of(updater.current_version()));
            }
        }
        Command::Status => {
            let record = load_record(&config.current_version_path)?;
            println!("version: {record}");
            println!("libraries:");
            for name in record.library_names() {
                println!("  {name}");
            }
        }
        Command::Init => init_record(&config.current_version_path)?,
        Command::Config => println!("{}", serde_json::to_string_pretty(&config)?),
    }
    Ok(())
}

fn init_record(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        println!("{} already exists", path.display());
        return Ok(());
    }
    save_record(path, &VersionRecord::none())?;
    println!("created {}", path.display());
    Ok(())
}

fn warn_if_not_newer(current: &VersionRecord, online: &VersionRecord) {
    if current != online && !online.is_newer_than(current) {
        warn!(
            "Published version {} is not newer than installed version {}",
            online, current
        );
    }
}

fn version_of(record: Option<&VersionRecord>) -> &str {
    record.map_or("unknown", VersionRecord::version)
}
