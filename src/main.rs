//! verbena-backend entry point.
//!
//! `serve` (the default) starts the Axum HTTP server; `sync` runs one
//! mirror-to-primary reconciliation pass and exits, non-zero when a
//! replica fails its connectivity check.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use clap::{Parser, Subcommand};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use verbena_backend::api;
use verbena_backend::app_state::AppState;
use verbena_backend::config::AppConfig;
use verbena_backend::db::router::RouterSettings;
use verbena_backend::db::{
    FailoverRouter, FlagStore, PgProbe, Reconciler, RoutedPools, SyncOptions, SyncStatusCell,
};
use verbena_backend::domain::{Clock, EventBus, SystemClock};
use verbena_backend::persistence::{BookingRepo, PgBookingRepo};
use verbena_backend::service::{
    BookingService, CartService, HttpApiMailer, Mailer, NotificationLog, NotificationWorker,
    NullMailer,
};

#[derive(Parser)]
#[command(name = "verbena-backend", version, about = "Party and event rental booking backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server (the default).
    Serve,
    /// Reconcile mirror-only rows onto the primary and exit.
    Sync {
        /// Report what would be copied without mutating anything.
        #[arg(long)]
        dry_run: bool,
        /// Restrict the run to a single table.
        #[arg(long)]
        table: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    match Cli::parse().command {
        None | Some(Command::Serve) => run_server(config).await,
        Some(Command::Sync { dry_run, table }) => run_sync(config, SyncOptions { dry_run, table }).await,
    }
}

/// Builds a lazily-connecting pool so the process boots even when the
/// replica is down.
fn build_pool(config: &AppConfig, options: PgConnectOptions) -> PgPool {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(config.database_acquire_timeout_secs))
        .connect_lazy_with(options)
}

async fn run_server(config: AppConfig) -> Result<()> {
    tracing::info!(addr = %config.listen_addr, "starting verbena-backend");

    let primary_opts: PgConnectOptions = config.primary_url.parse()?;
    let mirror_opts: PgConnectOptions = config.mirror_url.parse()?;
    let primary = build_pool(&config, primary_opts.clone());
    let mirror = build_pool(&config, mirror_opts);

    // Best-effort: a down primary must not keep the mirror from serving.
    if let Err(e) = sqlx::migrate!().run(&primary).await {
        tracing::warn!(error = %e, "primary migrations failed, continuing");
    }

    // Failover layer
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let flags = FlagStore::new(Arc::clone(&clock));
    let probe = Arc::new(PgProbe::new(
        primary_opts,
        Duration::from_secs(config.probe_timeout_secs),
    ));
    let (recovery_tx, recovery_rx) = mpsc::unbounded_channel();
    let router = Arc::new(FailoverRouter::new(
        RouterSettings {
            circuit_ttl: Duration::from_secs(config.circuit_ttl_secs),
            memo_ttl: Duration::from_millis(config.memo_ttl_ms),
        },
        flags.clone(),
        probe,
        clock,
        Some(recovery_tx),
    ));
    let pools = RoutedPools::new(primary.clone(), mirror.clone(), Arc::clone(&router));

    // Background reconciliation, fed by the router's recovery edges.
    let reconciler = Arc::new(Reconciler::new(
        primary,
        mirror,
        flags,
        Duration::from_secs(config.sync_lock_ttl_secs),
    ));
    let sync_status = SyncStatusCell::default();
    let _supervisor =
        verbena_backend::db::sync::spawn_supervisor(reconciler, recovery_rx, sync_status.clone());

    // Notifications
    let bus = EventBus::new(config.event_bus_capacity);
    let mailer: Arc<dyn Mailer> = match &config.mail_api_key {
        Some(key) => Arc::new(HttpApiMailer::new(
            config.mail_api_url.clone(),
            key.clone(),
            config.mail_sender_name.clone(),
            config.mail_sender_email.clone(),
        )),
        None => {
            tracing::warn!("MAIL_API_KEY unset, outbound mail disabled");
            Arc::new(NullMailer)
        }
    };
    let notifications = NotificationLog::new(100);
    let _worker = NotificationWorker::new(mailer, config.admin_email.clone(), notifications.clone())
        .spawn(bus.subscribe());

    // Services
    let repo: Arc<dyn BookingRepo> = Arc::new(PgBookingRepo::new(pools));
    let cart_service = Arc::new(CartService::new(
        Arc::clone(&repo),
        bus.clone(),
        config.tax_rate,
    ));
    let booking_service = Arc::new(BookingService::new(repo, bus, config.tax_rate));

    let app_state = AppState {
        cart_service,
        booking_service,
        router,
        sync_status,
        notifications,
    };

    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_sync(config: AppConfig, opts: SyncOptions) -> Result<()> {
    let primary = build_pool(&config, config.primary_url.parse()?);
    let mirror = build_pool(&config, config.mirror_url.parse()?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let reconciler = Reconciler::new(
        primary,
        mirror,
        FlagStore::new(clock),
        Duration::from_secs(config.sync_lock_ttl_secs),
    );

    let report = reconciler.run(&opts).await?;
    println!("{report}");
    Ok(())
}
