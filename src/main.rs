use anyhow::Context;
use log::{error, info, warn};
use std::sync::Arc;

use northlead::core::config::load_env_file;
use northlead::main_module::run_axum_server;
use northlead::pocketbase::schema;
use northlead::{AppConfig, AppState};

const USAGE: &str = "North Lead - GC outreach pipeline

Usage:
  northlead            Start the web server (default)
  northlead schema     Print the PocketBase collections import JSON
  northlead --help     Show this message

Configuration is read from the environment and .env:
  POCKETBASE_URL                  PocketBase base URL (fallback VITE_POCKETBASE_URL)
  NORTHLEAD_HOST                  Bind address (default 127.0.0.1)
  NORTHLEAD_PORT                  Bind port (default 8080)
  NORTHLEAD_SESSION_FILE          Persist the auth session to this JSON file
  NORTHLEAD_CACHE_TTL_SECS        Query cache freshness window (default 30)
  NORTHLEAD_REQUEST_TIMEOUT_SECS  Backend request timeout (default 30)
  RUST_LOG                        Log filter (default info)";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" => {
                println!("{USAGE}");
                return Ok(());
            }
            "schema" => {
                let json = serde_json::to_string_pretty(&schema::import_json())
                    .context("Failed to encode collection schema")?;
                println!("{json}");
                return Ok(());
            }
            other => {
                eprintln!("Unknown command: {other}\n\n{USAGE}");
                std::process::exit(2);
            }
        }
    }

    let env_file_error = load_env_file();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();

    if let Some(e) = env_file_error {
        warn!("Ignoring unreadable .env file: {e}");
    }
    let config = AppConfig::from_env().context("Invalid configuration")?;

    info!("Starting North Lead v{}", env!("CARGO_PKG_VERSION"));
    if config.pocketbase_url.is_none() {
        error!("POCKETBASE_URL is not set; serving the setup screen only");
    }

    let state = AppState::new(config)
        .await
        .context("Failed to initialise the PocketBase client")?;
    run_axum_server(Arc::new(state)).await?;
    Ok(())
}
