#![forbid(unsafe_code)]

//! **vault-server** – Process entry point for the nedovault secret vault.
//!
//! Loads configuration, opens the encrypted store, wires the auth service
//! and subscription registry together, and serves the `NedoVault` gRPC
//! service until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vault_auth::AuthService;
use vault_notify::Registry;
use vault_proto::nedo_vault_server::NedoVaultServer;
use vault_service::VaultRpc;
use vault_store::VaultStore;

//─────────────────────────────
//  CLI structure
//─────────────────────────────

#[derive(Parser)]
#[command(name = "nedovault-server")]
#[command(about = "nedovault - a small multi-user secret vault")]
#[command(version)]
struct Cli {
    /// Configuration file path (TOML/JSON/YAML, extension-sniffed).
    #[arg(long, default_value = "config/vault.toml")]
    config: String,

    /// Listen address override, e.g. 0.0.0.0:7070.
    #[arg(long)]
    listen_addr: Option<String>,

    /// Data directory override.
    #[arg(long)]
    data_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

//─────────────────────────────
//  File/env configuration
//─────────────────────────────

/// Settings loaded from `--config` and `VAULT_`-prefixed environment
/// variables, the latter taking precedence.
#[derive(Debug, Deserialize)]
struct Settings {
    /// Address the gRPC server binds to.
    listen_addr: String,
    /// Directory holding the sled database.
    data_dir: String,
    /// 32 raw bytes, base64-encoded, used to encrypt values at rest.
    encryption_key: String,
    /// HMAC signing key for bearer tokens.
    signing_key: String,
    /// Token time-to-live, in seconds. Defaults to 30 days.
    #[serde(default = "default_token_ttl_secs")]
    token_ttl_secs: u64,
    /// Live-stream refresh interval, in seconds. Defaults to 4.
    #[serde(default = "default_refresh_secs")]
    refresh_interval_secs: u64,
}

fn default_token_ttl_secs() -> u64 {
    vault_auth::DEFAULT_TOKEN_TTL.as_secs()
}

fn default_refresh_secs() -> u64 {
    vault_service::DEFAULT_REFRESH_INTERVAL.as_secs()
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(&cli.config).required(false))
        .add_source(config::Environment::with_prefix("VAULT").separator("__"))
        .build()
        .context("failed to assemble configuration sources")?;

    let mut settings: Settings = settings
        .try_deserialize()
        .context("configuration is missing required fields")?;

    if let Some(addr) = &cli.listen_addr {
        settings.listen_addr = addr.clone();
    }
    if let Some(dir) = &cli.data_dir {
        settings.data_dir = dir.clone();
    }

    Ok(settings)
}

fn decode_key_material(encoded: &str, field: &str) -> Result<[u8; 32]> {
    use base64::Engine;
    let raw = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .with_context(|| format!("{field} is not valid base64"))?;
    raw.try_into()
        .map_err(|_| anyhow::anyhow!("{field} must decode to exactly 32 bytes"))
}

//─────────────────────────────
//  Main application
//─────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.log_level);

    info!("starting nedovault-server v{}", env!("CARGO_PKG_VERSION"));

    let settings = load_settings(&cli)?;

    let encryption_key = decode_key_material(&settings.encryption_key, "encryption_key")?;

    std::fs::create_dir_all(&settings.data_dir)
        .with_context(|| format!("failed to create data directory {}", settings.data_dir))?;

    let store = Arc::new(
        VaultStore::open(&settings.data_dir, &encryption_key)
            .context("failed to open vault store")?,
    );
    info!(data_dir = %settings.data_dir, "vault store opened");

    let auth = Arc::new(AuthService::new(
        settings.signing_key.clone().into_bytes(),
        Duration::from_secs(settings.token_ttl_secs),
        store.clone(),
    ));

    let registry = Arc::new(Registry::new());

    let refresh_interval = Duration::from_secs(settings.refresh_interval_secs);
    let rpc = VaultRpc::new(auth, store.clone(), registry, refresh_interval);

    let addr: SocketAddr = settings
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address {}", settings.listen_addr))?;

    info!(%addr, "gRPC server listening");

    tonic::transport::Server::builder()
        .add_service(NedoVaultServer::new(rpc))
        .serve_with_shutdown(addr, shutdown_signal())
        .await
        .context("gRPC server error")?;

    info!("flushing store before exit");
    store.flush().await.context("failed to flush vault store")?;

    info!("nedovault-server stopped");
    Ok(())
}

fn init_logging(log_level: &str) {
    let filter = format!("vault_server={log_level},vault_service={log_level},vault_store={log_level},vault_auth={log_level},vault_notify={log_level}");

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
