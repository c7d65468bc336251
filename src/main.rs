mod api;
mod app;
mod cache;
mod config;
mod event;
mod form;
mod logging;
mod table;
mod task;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "taxdesk")]
#[command(about = "A terminal UI for browsing and editing tax customer records")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/taxdesk/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// API base URL (overrides config and TAXDESK_API_URL)
  #[arg(short, long)]
  api_url: Option<String>,

  /// Rows per page
  #[arg(short, long)]
  page_size: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Command line wins over file and environment
  if let Some(url) = args.api_url {
    config.api.base_url = url;
  }
  if let Some(page_size) = args.page_size {
    config.table.page_size = page_size;
  }
  config.validate()?;

  let _guard = logging::init(&config.log)?;
  info!(version = env!("CARGO_PKG_VERSION"), "taxdesk");

  // Initialize and run the app
  let mut app = app::App::new(&config)?;
  app.run().await?;

  Ok(())
}
