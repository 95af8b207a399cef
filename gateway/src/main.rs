//! fleetsync gateway
//!
//! Wires both backing systems, the sync log and the dual-write orchestrator,
//! then serves the HTTP API the dashboard talks to.
//!
//! Usage:
//!   fleetsync-gateway --config fleetsync.json
//!   fleetsync-gateway --primary-url http://platform:9000 --secondary-url http://backup:3001
//!
//! Flags override values from the config file.

use anyhow::{Context, Result};
use clap::Parser;
use fleetsync_client::{PrimaryClient, SecondaryClient};
use fleetsync_dualwrite::{DualWriteService, SqliteSyncLog};
use fleetsync_gateway::{GatewayConfig, build_router};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "fleetsync-gateway")]
#[command(about = "Dual-write gateway for the IoT platform and its backup API")]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the IoT platform API
    #[arg(long)]
    primary_url: Option<String>,

    /// Pre-issued platform access token
    #[arg(long, env = "FLEETSYNC_PRIMARY_TOKEN")]
    primary_token: Option<String>,

    /// Platform account email, used to request a token at startup
    #[arg(long, requires = "primary_password")]
    primary_email: Option<String>,

    /// Platform account password
    #[arg(long, env = "FLEETSYNC_PRIMARY_PASSWORD")]
    primary_password: Option<String>,

    /// Base URL of the backup API
    #[arg(long)]
    secondary_url: Option<String>,

    /// API key for the backup API
    #[arg(long, env = "FLEETSYNC_SECONDARY_API_KEY")]
    secondary_api_key: Option<String>,

    /// Write to the backup API first
    #[arg(long)]
    prefer_secondary: bool,

    /// Fail writes when the first system fails instead of falling back
    #[arg(long)]
    no_fallback: bool,

    /// Path to the sync log database
    #[arg(long)]
    sync_log: Option<PathBuf>,

    /// HTTP API port
    #[arg(long)]
    http_port: Option<u16>,

    /// Run a reconciliation sweep every N seconds
    #[arg(long)]
    sync_interval: Option<u64>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<(GatewayConfig, Option<(String, String)>)> {
        let mut config = match &self.config {
            Some(path) => GatewayConfig::load(path)?,
            None => GatewayConfig::default(),
        };

        if let Some(url) = self.primary_url {
            config.primary.base_url = url;
        }
        if let Some(token) = self.primary_token {
            config.primary.token = Some(token);
        }
        if let Some(url) = self.secondary_url {
            config.secondary.base_url = url;
        }
        if let Some(key) = self.secondary_api_key {
            config.secondary.api_key = Some(key);
        }
        if self.prefer_secondary {
            config.dual_write.prefer_secondary = true;
        }
        if self.no_fallback {
            config.dual_write.fallback_enabled = false;
        }
        if let Some(path) = self.sync_log {
            config.sync_log_path = path;
        }
        if let Some(port) = self.http_port {
            config.http_port = port;
        }
        if let Some(secs) = self.sync_interval {
            config.sync_interval_secs = Some(secs);
        }

        let credentials = self.primary_email.zip(self.primary_password);
        Ok((config, credentials))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let (config, credentials) = args.into_config()?;
    info!("fleetsync gateway starting...");

    let primary =
        PrimaryClient::new(config.primary.clone()).context("Failed to build platform client")?;
    if let Some((email, password)) = credentials {
        primary
            .authenticate(&email, &password)
            .await
            .context("Failed to authenticate with the platform")?;
        info!("Authenticated with the platform as {email}");
    }
    let secondary = SecondaryClient::new(config.secondary.clone())
        .context("Failed to build backup API client")?;
    let sync_log = SqliteSyncLog::open(&config.sync_log_path).with_context(|| {
        format!("Failed to open sync log at {}", config.sync_log_path.display())
    })?;

    let service = Arc::new(DualWriteService::new(
        Arc::new(primary),
        Arc::new(secondary),
        Arc::new(sync_log),
        config.dual_write,
    ));

    if let Some(secs) = config.sync_interval_secs.filter(|s| *s > 0) {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(secs));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let summary = service.sync_data().await;
                if summary.errors.is_empty() {
                    info!(
                        attempted = summary.attempted,
                        resolved = summary.total_resolved(),
                        "Reconciliation sweep finished"
                    );
                } else {
                    warn!(
                        attempted = summary.attempted,
                        resolved = summary.total_resolved(),
                        errors = summary.errors.len(),
                        "Reconciliation sweep finished with errors"
                    );
                }
            }
        });
    }

    let app = build_router(service);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .with_context(|| format!("Failed to bind HTTP port {}", config.http_port))?;

    println!("\n========================================");
    println!("  fleetsync Gateway Running");
    println!("========================================");
    println!("  Primary:    {}", config.primary.base_url);
    println!("  Secondary:  {}", config.secondary.base_url);
    println!("  Preferred:  {}", config.dual_write.preferred_system());
    println!("  Fallback:   {}", config.dual_write.fallback_enabled);
    println!("  Sync log:   {}", config.sync_log_path.display());
    println!("  HTTP Port:  {}", config.http_port);
    println!("========================================\n");

    axum::serve(listener, app).await.context("HTTP server failed")
}
