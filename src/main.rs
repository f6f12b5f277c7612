mod app;
mod assets;
mod commands;
mod config;
mod error;
mod event;
mod gateway;
mod links;
mod model;
mod queue;
mod reconcile;
mod remote;
mod store;

#[cfg(test)]
mod testing;

use clap::Parser;
use color_eyre::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let cli = commands::Cli::parse();
  let _log_guard = init_tracing();

  let config = config::Config::load(cli.config.as_deref())?;

  let app = app::App::new(config)?;
  app.run(cli.command).await?;

  Ok(())
}

/// Log to stderr through a non-blocking writer; RUST_LOG overrides the level.
fn init_tracing() -> WorkerGuard {
  let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dineline=info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_target(false)
    .init();

  guard
}
