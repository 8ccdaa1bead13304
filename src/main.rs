mod app;
mod cache;
mod cart;
mod catalog;
mod commands;
mod config;
mod db;
mod ebook;
mod state;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use config::LogConfig;

#[derive(Parser, Debug)]
#[command(name = "storefront")]
#[command(about = "Offline cache and state hydration core for a small storefront")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/storefront/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// More output (-v info, -vv debug); STOREFRONT_LOG overrides
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Keep the guard alive so buffered log lines reach the file
  let _guard = init_logging(args.verbose, &config.log)?;

  commands::run(args.command, &config).await
}

fn init_logging(verbose: u8, log: &LogConfig) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_env("STOREFRONT_LOG").unwrap_or_else(|_| match verbose {
    0 => EnvFilter::new(log.level.as_deref().unwrap_or("storefront=warn")),
    1 => EnvFilter::new("storefront=info"),
    _ => EnvFilter::new("storefront=debug"),
  });

  let Some(file) = &log.file else {
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_target(false)
      .with_writer(std::io::stderr)
      .init();
    return Ok(None);
  };

  // Relative log paths live under the data directory
  let path = if file.is_absolute() {
    file.clone()
  } else {
    dirs::data_dir()
      .ok_or_else(|| eyre!("Could not determine data directory"))?
      .join("storefront")
      .join(file)
  };

  let dir = path
    .parent()
    .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
  let name = path
    .file_name()
    .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
  std::fs::create_dir_all(dir).map_err(|e| eyre!("Failed to create log directory: {}", e))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_ansi(false)
    .with_writer(writer)
    .init();

  Ok(Some(guard))
}
