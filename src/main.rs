use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use psyduck_pipeline::config::AppConfig;
use psyduck_pipeline::instance_lock::InstanceLock;
use psyduck_pipeline::leader_election::LeaderElection;
use psyduck_pipeline::log_format::TargetFirstFormat;
use psyduck_pipeline::partitions::{clean, ensure};
use psyduck_pipeline::refreshers::geofence::GeofenceClient;
use psyduck_pipeline::refreshers::{geofence, pokestop_counts};
use psyduck_pipeline::relational_store::{self, MySqlPool};
use psyduck_pipeline::shared_state::SharedState;
use psyduck_pipeline::staging_store::{self, StagingStore};
use psyduck_pipeline::supervisor::{Service, Supervisor};
use psyduck_pipeline::{flushers, metrics, reconcile, webhook};

#[derive(Parser)]
#[command(name = "psyduck-pipeline", about = "Telemetry ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the webhook server plus the leader-only background services.
    Run,
    /// Run pending database migrations and exit.
    MigrateCheck,
    /// Run one partition-ensure pass against every managed table and exit.
    EnsurePartitions,
    /// Run one partition-cleanup pass against every managed table and exit.
    CleanPartitions {
        #[arg(long)]
        dry_run: bool,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().event_format(TargetFirstFormat);
    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

fn init_sentry() -> Option<sentry::ClientInitGuard> {
    std::env::var("SENTRY_DSN")
        .ok()
        .map(|dsn| sentry::init((dsn, sentry::ClientOptions { traces_sample_rate: 0.1, ..Default::default() })))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let _sentry_guard = init_sentry();

    let cli = Cli::parse();
    let cfg = AppConfig::from_env().context("loading configuration")?;
    let pool = relational_store::build_pool(&cfg.database_url, cfg.db_pool_max).context("building MySQL pool")?;

    match cli.command {
        Command::MigrateCheck => {
            tokio::task::spawn_blocking({
                let pool = pool.clone();
                move || relational_store::run_pending_migrations(&pool)
            })
            .await
            .context("migration task panicked")??;
            info!("migrations up to date");
            Ok(())
        }
        Command::EnsurePartitions => {
            ensure::ensure_all(pool, cfg.partition_days_back, cfg.partition_days_forward).await?;
            Ok(())
        }
        Command::CleanPartitions { dry_run } => {
            let retention = clean::CleanRetention {
                pokemon_iv: cfg.clean_pokemon_iv.clone(),
                raids: cfg.clean_raids.clone(),
                quests: cfg.clean_quests.clone(),
                invasions: cfg.clean_invasions.clone(),
                shiny: cfg.clean_shiny.clone(),
            };
            clean::clean_all(pool, &retention, dry_run).await?;
            Ok(())
        }
        Command::Run => run(cfg, pool).await,
    }
}

async fn run(cfg: AppConfig, pool: MySqlPool) -> Result<()> {
    let _instance_lock = InstanceLock::new("psyduck-pipeline-run").context("acquiring instance lock")?;
    info!(path = %_instance_lock.path().display(), "acquired instance lock");

    tokio::task::spawn_blocking({
        let pool = pool.clone();
        move || relational_store::run_pending_migrations(&pool)
    })
    .await
    .context("migration task panicked")??;

    let store = staging_store::ensure_client(&cfg.redis_url).await.context("connecting to staging store")?;
    let shared = SharedState::new(
        store.clone(),
        Duration::from_secs(cfg.geofence.refresh_cache_seconds),
        Duration::from_secs(cfg.geofence.expire_cache_seconds),
    );

    // `start_metrics_server` installs the Prometheus recorder and zeroes
    // every pipeline counter/gauge itself; nothing else may call
    // `metrics::init_metrics` or this would double-install the recorder.
    let metrics_port = cfg.metrics_port;
    tokio::spawn(async move { metrics::start_metrics_server(metrics_port).await }.instrument(tracing::info_span!("metrics_server")));

    let cfg = Arc::new(cfg);
    let leader = LeaderElection::new(store.clone(), Duration::from_secs(cfg.leader_lock_ttl_secs));
    let state = webhook::AppState::new(store.clone(), cfg.clone()).with_leader_status(leader.status_handle());
    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await.context("binding webhook listener")?;
    info!(addr = %cfg.listen_addr, "webhook server listening");
    tokio::spawn(
        async move {
            if let Err(e) = axum::serve(listener, webhook::router(state)).await {
                error!("webhook server exited: {e:#}");
            }
        }
        .instrument(tracing::info_span!("webhook_server")),
    );

    let leader_cancel = spawn_leader_services(leader, store, pool, shared, cfg.clone());

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal, stopping"),
        Err(e) => warn!(error = %e, "failed to listen for shutdown signal"),
    }
    leader_cancel.cancel();
    // Give the flushers a moment to run their final force_flush before exit.
    tokio::time::sleep(Duration::from_secs(2)).await;
    Ok(())
}

/// Spawns the acquire/renew loop and, once this process wins leadership,
/// the reconciliation pass followed by every leader-only background
/// service (flushers, partition ensurer/cleaner, external-data
/// refreshers). All of them share one `CancellationToken` so a single
/// shutdown signal stops them together; losing (rather than never
/// acquiring) leadership does not itself stop already-running services,
/// matching this deployment's single-writer-in-steady-state assumption.
fn spawn_leader_services(
    leader: LeaderElection,
    store: StagingStore,
    pool: MySqlPool,
    shared: SharedState,
    cfg: Arc<AppConfig>,
) -> CancellationToken {
    let cancel = leader.cancellation_token();
    leader.spawn(move || async move {
        reconcile::reconcile_stale_buffers(&store, &pool).await;

        let mut supervisor = Supervisor::new();

        register_flushers(&mut supervisor, &store, &pool, &cfg, &cancel);
        register_partitions(&mut supervisor, &pool, &cfg, &cancel);
        register_refreshers(&mut supervisor, &pool, &shared, &cfg, &cancel);

        supervisor.start_all();

        // Supervisor only drives startup ordering here; shutdown runs
        // through the shared CancellationToken every registered service
        // was handed, not through Supervisor::stop_all — none of these
        // services registered a stop closure, they self-cancel.
        tokio::spawn(async move {
            cancel.cancelled().await;
            info!("leader-only services cancelled");
        });
    })
}

fn register_flushers(supervisor: &mut Supervisor, store: &StagingStore, pool: &MySqlPool, cfg: &Arc<AppConfig>, cancel: &CancellationToken) {
    supervisor.register(Service::new("pokemon_iv_flusher", cfg.pokemon_iv.enabled, {
        let (store, pool, cfg, cancel) = (store.clone(), pool.clone(), cfg.clone(), cancel.clone());
        move || flushers::spawn_pokemon_iv_flusher(store, pool, cfg.pokemon_iv.clone(), cancel)
    }));
    supervisor.register(Service::new("shiny_flusher", cfg.shiny.enabled, {
        let (store, pool, cfg, cancel) = (store.clone(), pool.clone(), cfg.clone(), cancel.clone());
        move || flushers::spawn_shiny_flusher(store, pool, cfg.shiny.clone(), cancel)
    }));
    supervisor.register(Service::new("raids_flusher", cfg.raids.enabled, {
        let (store, pool, cfg, cancel) = (store.clone(), pool.clone(), cfg.clone(), cancel.clone());
        move || flushers::spawn_raids_flusher(store, pool, cfg.raids.clone(), cfg.raids.max_threshold, cancel)
    }));
    supervisor.register(Service::new("quests_flusher", cfg.quests.enabled, {
        let (store, pool, cfg, cancel) = (store.clone(), pool.clone(), cfg.clone(), cancel.clone());
        move || flushers::spawn_quests_flusher(store, pool, cfg.quests.clone(), cfg.quests.max_threshold, cancel)
    }));
    supervisor.register(Service::new("invasions_flusher", cfg.invasions.enabled, {
        let (store, pool, cfg, cancel) = (store.clone(), pool.clone(), cfg.clone(), cancel.clone());
        move || flushers::spawn_invasions_flusher(store, pool, cfg.invasions.clone(), cfg.invasions.max_threshold, cancel)
    }));
}

fn register_partitions(supervisor: &mut Supervisor, pool: &MySqlPool, cfg: &Arc<AppConfig>, cancel: &CancellationToken) {
    supervisor.register(Service::new("partition_ensurer", true, {
        let (pool, cfg, cancel) = (pool.clone(), cfg.clone(), cancel.clone());
        move || {
            ensure::spawn_ensure_loop(
                pool,
                Duration::from_secs(cfg.partition_ensure_interval_secs),
                cfg.partition_days_back,
                cfg.partition_days_forward,
                cancel,
            )
        }
    }));
    supervisor.register(Service::new("partition_cleaner", true, {
        let (pool, cfg, cancel) = (pool.clone(), cfg.clone(), cancel.clone());
        move || {
            let retention = clean::CleanRetention {
                pokemon_iv: cfg.clean_pokemon_iv.clone(),
                raids: cfg.clean_raids.clone(),
                quests: cfg.clean_quests.clone(),
                invasions: cfg.clean_invasions.clone(),
                shiny: cfg.clean_shiny.clone(),
            };
            clean::spawn_clean_loop(pool, Duration::from_secs(cfg.partition_clean_interval_secs), retention, false, cancel)
        }
    }));
}

fn register_refreshers(supervisor: &mut Supervisor, pool: &MySqlPool, shared: &SharedState, cfg: &Arc<AppConfig>, cancel: &CancellationToken) {
    let geofence_enabled = cfg.geofence.api_url.is_some() && cfg.geofence.api_token.is_some();
    supervisor.register(Service::new("geofence_refresher", geofence_enabled, {
        let (shared, cfg, cancel) = (shared.clone(), cfg.clone(), cancel.clone());
        move || {
            let client = GeofenceClient::new(
                cfg.geofence.api_url.clone().unwrap_or_default(),
                cfg.geofence.api_token.clone().unwrap_or_default(),
            );
            geofence::spawn_geofence_refresh_loop(client, shared, Duration::from_secs(cfg.geofence.refresh_cache_seconds), cancel)
        }
    }));
    supervisor.register(Service::new("pokestop_count_refresher", true, {
        let (pool, shared, cfg, cancel) = (pool.clone(), shared.clone(), cfg.clone(), cancel.clone());
        move || {
            pokestop_counts::spawn_pokestop_count_refresh_loop(
                pool,
                shared,
                Duration::from_secs(cfg.pokestop_counts.refresh_interval_seconds),
                cancel,
            )
        }
    }));
}
