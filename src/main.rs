mod app;
mod event;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use ternak::config::Config;
use ternak::resource::EntityKind;

#[derive(Parser, Debug)]
#[command(name = "ternak")]
#[command(about = "Terminal client for the livestock procurement backend")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./ternak.yaml, then $XDG_CONFIG_HOME/ternak/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Entity to open first
  #[arg(short, long, value_enum)]
  entity: Option<EntityKind>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  // Log to a file, the terminal belongs to the UI
  let _guard = ternak::logging::init(None)?;

  // Initialize and run the app
  let mut app = app::App::new(config, args.entity.unwrap_or_default())?;
  app.run().await?;

  Ok(())
}
