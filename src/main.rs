//! Parking Reservation Service: server binary
//!
//! ```sh
//! # Run with default config (~/.config/parking-service/config.toml)
//! parking-service
//!
//! # Custom config path and port
//! parking-service --config /etc/parking-service/config.toml --port 6000
//!
//! # Create tables and seed the slots, then exit
//! parking-service --init-only
//!
//! # Wipe every booking and reseed
//! parking-service --reset --yes
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use parking_service::config::AppConfig;
use parking_service::server::{init_tracing, prepare_database, ServerHandle, ServerOptions};

/// Parking Reservation Service: JSON-over-TCP slot booking server.
#[derive(Parser, Debug)]
#[command(
    name = "parking-service",
    version,
    about = "Multi-client parking slot reservation server",
    long_about = "Parking reservation server: clients book, cancel and list parking \
                  slots over a JSON-over-TCP protocol; bookings are kept in SQLite.\n\n\
                  Default config: ~/.config/parking-service/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "PARKING_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen host.
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Override the database connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,

    /// Run migrations and seed the slot table, then exit.
    #[arg(long, conflicts_with_all = ["reset", "ephemeral"])]
    init_only: bool,

    /// Drop and recreate all tables, reseed the slots, then exit.
    #[arg(long, requires = "yes", conflicts_with = "ephemeral")]
    reset: bool,

    /// Confirm a destructive `--reset`.
    #[arg(long)]
    yes: bool,

    /// Keep all state in memory; nothing is written to disk.
    #[arg(long)]
    ephemeral: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(parking_service::default_config_path);

    let mut config = match AppConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .init();
            error!("Failed to load config from {}: {}", config_path.display(), e);
            return Err(e.into());
        }
    };

    // ── Apply CLI overrides ────────────────────────────────────
    let mut overrides = Vec::new();
    if let Some(ref host) = cli.host {
        overrides.push(format!("host = {}", host));
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        overrides.push(format!("port = {}", port));
        config.server.port = port;
    }
    if let Some(ref level) = cli.log_level {
        overrides.push(format!("log_level = {}", level));
        config.logging.level = level.clone();
    }
    if let Some(ref url) = cli.database_url {
        overrides.push(format!("database_url = {}", url));
        config.database.url = Some(url.clone());
    }

    init_tracing(&config);
    info!("Configuration loaded from {}", config_path.display());
    for o in &overrides {
        info!("CLI override: {}", o);
    }
    config.validate()?;

    // ── Config validation mode ─────────────────────────────────
    if cli.check {
        println!("✅ Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   Address     : {}", config.server.address());
        println!("   Database    : {}", config.database.connection_url());
        println!(
            "   Slots       : {}1..{}{}",
            config.catalog.slot_prefix, config.catalog.slot_prefix, config.catalog.slot_count
        );
        println!("   Log level   : {}", config.logging.level);
        if config.metrics.enabled {
            println!("   Metrics     : http://{}/metrics", config.metrics.listen);
        }
        return Ok(());
    }

    // ── One-shot database maintenance ──────────────────────────
    if cli.init_only || cli.reset {
        let db = prepare_database(&config, true, cli.reset).await?;
        db.close().await?;
        if cli.reset {
            info!("✅ Database reset; all bookings removed");
        } else {
            info!("✅ Database initialized");
        }
        return Ok(());
    }

    // ── Start server ───────────────────────────────────────────
    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
        reset_database: false,
        ephemeral: cli.ephemeral,
    })
    .await?;

    // Install OS signal handlers (SIGTERM, SIGINT)
    handle.install_signal_handler();

    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.wait().await?;

    Ok(())
}
