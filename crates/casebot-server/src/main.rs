//! casebot server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered with
//! `CASEBOT_*` environment variables, opens the SQLite store, and serves the
//! channel webhook and operator endpoints over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use casebot_core::intake::IntakeService;
use casebot_server::{AppState, ServerConfig, notify::ConfiguredNotifier};
use casebot_store_sqlite::SqliteStore;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const SWEEP_EVERY: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(author, version, about = "casebot intake server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("CASEBOT"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let notifier =
    ConfiguredNotifier::from_config(server_cfg.notifier, server_cfg.notify_url.as_deref())
      .context("failed to build notifier")?;

  let intake = Arc::new(
    IntakeService::new(Arc::new(store), Arc::new(notifier))
      .with_reply_timeout(server_cfg.reply_timeout()),
  );
  casebot_server::spawn_session_sweeper(
    Arc::clone(&intake),
    server_cfg.session_idle(),
    SWEEP_EVERY,
  );

  let app = casebot_server::router(AppState { intake });
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!(notifier = ?server_cfg.notifier, "Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
