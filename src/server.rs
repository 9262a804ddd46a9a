//! Reusable parking service runtime.
//!
//! Provides [`ServerHandle`] that encapsulates the full server lifecycle:
//! database init, migrations, slot seeding, reservation core restore, the
//! TCP listener, metrics, and graceful shutdown.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::{RequestDispatcher, ReservationService};
use crate::config::{AppConfig, MetricsConfig};
use crate::domain::SlotRepository;
use crate::infrastructure::database::migrator::Migrator;
use crate::infrastructure::{
    init_database, DatabaseConfig, InMemoryLedger, InMemorySlotRepository, SeaOrmLedger,
    SeaOrmSlotRepository,
};
use crate::interfaces::tcp::{ConnectionLimits, ParkingServer};
use crate::support::errors::{AppError, InfraError, ReservationError};
use crate::support::shutdown::{ShutdownCoordinator, ShutdownSignal};

// ── Options ────────────────────────────────────────────────────────

/// Options for starting the parking service.
pub struct ServerOptions {
    /// Application configuration.
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
    /// Drop and recreate every table before seeding (default: false).
    pub reset_database: bool,
    /// Keep all state in memory; no database is opened (default: false).
    pub ephemeral: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
            reset_database: false,
            ephemeral: false,
        }
    }
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running parking service.
///
/// # Examples
///
/// ```rust,no_run
/// use parking_service::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     // ... wait for shutdown signal ...
///     handle.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    /// The configuration the server was started with.
    pub config: AppConfig,
    /// Address the TCP listener is bound to.
    pub local_addr: SocketAddr,

    core: Arc<ReservationService>,
    db: Option<DatabaseConnection>,
    shutdown: ShutdownCoordinator,
    server_task: JoinHandle<()>,
}

impl ServerHandle {
    /// Start the parking service with the given options.
    ///
    /// This will:
    /// 1. Install the Prometheus exporter (if enabled)
    /// 2. Connect to the database, migrate and seed the slot table
    /// 3. Restore the reservation core from the ledger
    /// 4. Bind the TCP listener and start accepting requests
    pub async fn start(opts: ServerOptions) -> Result<Self, AppError> {
        let app_cfg = opts.config;
        app_cfg.validate()?;

        info!("Starting parking reservation service...");
        install_metrics_exporter(&app_cfg.metrics)?;

        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        // ── Storage & reservation core ─────────────────────────
        let (core, db) = if opts.ephemeral {
            warn!("Running with in-memory storage; bookings are lost on exit");
            let slots = InMemorySlotRepository::new();
            slots.seed_if_empty(&app_cfg.catalog.labels()).await?;
            let core = ReservationService::restore(&slots, Arc::new(InMemoryLedger::new())).await?;
            (core, None)
        } else {
            let db = prepare_database(&app_cfg, opts.auto_migrate, opts.reset_database).await?;
            let slots = SeaOrmSlotRepository::new(db.clone());
            let ledger = Arc::new(SeaOrmLedger::new(db.clone()));
            let core = match ReservationService::restore(&slots, ledger).await {
                Ok(core) => core,
                Err(e) => {
                    error!("Refusing to start: {}", e);
                    let _ = db.close().await;
                    return Err(e.into());
                }
            };
            (core, Some(db))
        };
        let core = Arc::new(core.with_shutdown(shutdown_signal.clone()));

        // ── TCP listener ───────────────────────────────────────
        let dispatcher = RequestDispatcher::new(core.clone());
        let server = ParkingServer::bind(
            &app_cfg.server.address(),
            dispatcher,
            ConnectionLimits::from(&app_cfg.server),
        )
        .await?
        .with_shutdown(shutdown_signal, shutdown.timeout());
        let local_addr = server.local_addr()?;

        let server_task = tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Parking server error: {}", e);
            }
        });

        info!("🚀 Parking service started on {}", local_addr);

        Ok(Self {
            config: app_cfg,
            local_addr,
            core,
            db,
            shutdown,
            server_task,
        })
    }

    /// Get a cloneable shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Trigger graceful shutdown (non-blocking).
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait until shutdown has been triggered and every component has
    /// stopped. Fails when the service stopped because of an integrity
    /// violation.
    pub async fn wait(self) -> Result<(), AppError> {
        let Self {
            core,
            db,
            shutdown,
            server_task,
            ..
        } = self;

        shutdown
            .shutdown_with_cleanup(|| async move {
                match server_task.await {
                    Ok(()) => info!("Parking server stopped"),
                    Err(e) => error!("Parking server task panicked: {}", e),
                }
            })
            .await;

        let violation = core.integrity_violation();
        if violation.is_none() {
            if let Err(e) = core.verify_consistency().await {
                error!("Consistency check on shutdown failed: {}", e);
            }
        }

        if let Some(db) = db {
            if let Err(e) = db.close().await {
                warn!("Error closing database connection: {}", e);
            } else {
                info!("✅ Database connection closed");
            }
        }

        match violation {
            Some(message) => {
                error!("👋 Parking service stopped after an integrity violation");
                Err(ReservationError::Integrity(message).into())
            }
            None => {
                info!("👋 Parking service shutdown complete");
                Ok(())
            }
        }
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) -> Result<(), AppError> {
        info!("🛑 Shutting down parking service...");
        self.trigger_shutdown();
        self.wait().await
    }

    /// Check if the server is still running.
    pub fn is_running(&self) -> bool {
        !self.server_task.is_finished()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Connect to the configured database, bring the schema up to date (or
/// recreate it when `reset` is set) and seed the slot table if it is empty.
pub async fn prepare_database(
    config: &AppConfig,
    auto_migrate: bool,
    reset: bool,
) -> Result<DatabaseConnection, AppError> {
    let db_config = DatabaseConfig {
        url: config.database.connection_url(),
        max_connections: config.database.max_connections,
    };
    let db = init_database(&db_config).await?;

    if reset {
        warn!("Resetting database: dropping and recreating all tables");
        Migrator::fresh(&db).await?;
    } else if auto_migrate {
        info!("Running database migrations...");
        Migrator::up(&db, None).await?;
        info!("Migrations completed");
    }

    let seeded = SeaOrmSlotRepository::new(db.clone())
        .seed_if_empty(&config.catalog.labels())
        .await?;
    if seeded > 0 {
        info!(slots = seeded, "Seeded parking slots");
    }
    Ok(db)
}

/// Install the Prometheus exporter once per process.
fn install_metrics_exporter(config: &MetricsConfig) -> Result<(), AppError> {
    static INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

    if !config.enabled {
        return Ok(());
    }
    if let Some(addr) = INSTALLED.get() {
        info!("📊 Prometheus exporter already running on {}", addr);
        return Ok(());
    }

    let addr: SocketAddr = config
        .listen
        .parse()
        .map_err(|e| InfraError::Config(format!("metrics.listen: {}", e)))?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| InfraError::Config(format!("metrics exporter: {}", e)))?;
    let _ = INSTALLED.set(addr);

    metrics::describe_counter!("parking_requests_total", "Requests by action and outcome");
    metrics::describe_histogram!(
        "parking_request_duration_seconds",
        metrics::Unit::Seconds,
        "Request handling latency by action"
    );
    metrics::describe_gauge!("parking_slots_occupied", "Slots currently held by a booking");

    info!("📊 Prometheus metrics exposed on http://{}/metrics", addr);
    Ok(())
}

/// Initialize tracing (logging) from the application config.
///
/// Call this once at process startup (before [`ServerHandle::start`]).
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let installed = match config.logging.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
    };
    if let Err(e) = installed {
        eprintln!("Tracing already initialized: {}", e);
    }
}
