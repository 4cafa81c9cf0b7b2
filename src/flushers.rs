//! Flusher Supervisors (C7): one periodic loop per staging buffer that
//! drains it into the relational store via the matching bulk processor.
//!
//! Shape follows `flight_tracker::start_timeout_checker`: a `tokio::interval`
//! loop wrapped in a tracing span, cancellable via `CancellationToken`, with
//! a final unconditional drain on shutdown so no buffered rows are lost.

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};

use crate::buffers::{invasions, pokemon_iv, quests, raids, shiny};
use crate::bulk;
use crate::config::BufferConfig;
use crate::relational_store::MySqlPool;
use crate::staging_store::StagingStore;

/// Every 6th cycle runs an unconditional `force_flush` instead of the
/// threshold-gated `flush_if_ready`, matching spec's flusher cadence.
const FORCE_FLUSH_EVERY: u64 = 6;

async fn probe(store: &StagingStore) -> bool {
    store.ping().await.is_ok()
}

pub fn spawn_pokemon_iv_flusher(
    store: StagingStore,
    pool: MySqlPool,
    cfg: BufferConfig,
    cancel: CancellationToken,
) {
    if !cfg.enabled {
        info!("pokemon_iv flusher disabled by config");
        return;
    }
    tokio::spawn(
        async move {
            let mut cycle = 0u64;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(cfg.flush_interval) => {}
                    _ = cancel.cancelled() => {
                        info!("pokemon_iv flusher stopping, running final force_flush");
                        if let Err(e) = flush_once(&store, &pool, true).await {
                            error!("pokemon_iv final force_flush failed: {e:#}");
                        }
                        return;
                    }
                }
                if !probe(&store).await {
                    warn!("staging store unreachable, skipping pokemon_iv flush cycle");
                    continue;
                }
                cycle += 1;
                let force = cycle % FORCE_FLUSH_EVERY == 0;
                if let Err(e) = flush_once(&store, &pool, force).await {
                    error!("pokemon_iv flush cycle failed: {e:#}");
                }
            }

            async fn flush_once(store: &StagingStore, pool: &MySqlPool, force: bool) -> anyhow::Result<()> {
                let rows = if force {
                    pokemon_iv::force_flush(store).await?
                } else {
                    pokemon_iv::flush_if_ready(store, 1).await?
                };
                if !rows.is_empty() {
                    let n = bulk::pokemon_iv::bulk_upsert(pool.clone(), rows).await?;
                    info!(rows = n, "flushed pokemon_iv buffer");
                }
                Ok(())
            }
        }
        .instrument(tracing::info_span!("pokemon_iv_flusher")),
    );
}

pub fn spawn_shiny_flusher(store: StagingStore, pool: MySqlPool, cfg: BufferConfig, cancel: CancellationToken) {
    if !cfg.enabled {
        info!("shiny flusher disabled by config");
        return;
    }
    tokio::spawn(
        async move {
            let mut cycle = 0u64;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(cfg.flush_interval) => {}
                    _ = cancel.cancelled() => {
                        info!("shiny flusher stopping, running final force_flush");
                        if let Err(e) = flush_once(&store, &pool, true).await {
                            error!("shiny final force_flush failed: {e:#}");
                        }
                        return;
                    }
                }
                if !probe(&store).await {
                    warn!("staging store unreachable, skipping shiny flush cycle");
                    continue;
                }
                cycle += 1;
                let force = cycle % FORCE_FLUSH_EVERY == 0;
                if let Err(e) = flush_once(&store, &pool, force).await {
                    error!("shiny flush cycle failed: {e:#}");
                }
            }

            async fn flush_once(store: &StagingStore, pool: &MySqlPool, force: bool) -> anyhow::Result<()> {
                let rows = if force {
                    shiny::force_flush(store).await?
                } else {
                    shiny::flush_if_ready(store, 1).await?
                };
                if !rows.is_empty() {
                    let n = bulk::shiny::bulk_upsert(pool.clone(), rows).await?;
                    info!(rows = n, "flushed shiny buffer");
                }
                Ok(())
            }
        }
        .instrument(tracing::info_span!("shiny_flusher")),
    );
}

pub fn spawn_raids_flusher(
    store: StagingStore,
    pool: MySqlPool,
    cfg: BufferConfig,
    threshold: i64,
    cancel: CancellationToken,
) {
    if !cfg.enabled {
        info!("raids flusher disabled by config");
        return;
    }
    tokio::spawn(
        async move {
            let mut cycle = 0u64;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(cfg.flush_interval) => {}
                    _ = cancel.cancelled() => {
                        info!("raids flusher stopping, running final force_flush");
                        if let Err(e) = flush_once(&store, &pool, true, threshold).await {
                            error!("raids final force_flush failed: {e:#}");
                        }
                        return;
                    }
                }
                if !probe(&store).await {
                    warn!("staging store unreachable, skipping raids flush cycle");
                    continue;
                }
                cycle += 1;
                let force = cycle % FORCE_FLUSH_EVERY == 0;
                if let Err(e) = flush_once(&store, &pool, force, threshold).await {
                    error!("raids flush cycle failed: {e:#}");
                }
            }

            async fn flush_once(store: &StagingStore, pool: &MySqlPool, force: bool, threshold: i64) -> anyhow::Result<()> {
                let rows = if force {
                    raids::force_flush(store).await?
                } else {
                    raids::flush_if_ready(store, threshold).await?
                };
                if !rows.is_empty() {
                    let n = bulk::raids::bulk_upsert(pool.clone(), rows).await?;
                    info!(rows = n, "flushed raids buffer");
                }
                Ok(())
            }
        }
        .instrument(tracing::info_span!("raids_flusher")),
    );
}

pub fn spawn_quests_flusher(
    store: StagingStore,
    pool: MySqlPool,
    cfg: BufferConfig,
    threshold: i64,
    cancel: CancellationToken,
) {
    if !cfg.enabled {
        info!("quests flusher disabled by config");
        return;
    }
    tokio::spawn(
        async move {
            let mut cycle = 0u64;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(cfg.flush_interval) => {}
                    _ = cancel.cancelled() => {
                        info!("quests flusher stopping, running final force_flush");
                        if let Err(e) = flush_once(&store, &pool, true, threshold).await {
                            error!("quests final force_flush failed: {e:#}");
                        }
                        return;
                    }
                }
                if !probe(&store).await {
                    warn!("staging store unreachable, skipping quests flush cycle");
                    continue;
                }
                cycle += 1;
                let force = cycle % FORCE_FLUSH_EVERY == 0;
                if let Err(e) = flush_once(&store, &pool, force, threshold).await {
                    error!("quests flush cycle failed: {e:#}");
                }
            }

            async fn flush_once(store: &StagingStore, pool: &MySqlPool, force: bool, threshold: i64) -> anyhow::Result<()> {
                let rows = if force {
                    quests::force_flush(store).await?
                } else {
                    quests::flush_if_ready(store, threshold).await?
                };
                if !rows.is_empty() {
                    let n = bulk::quests::bulk_insert(pool.clone(), rows).await?;
                    info!(rows = n, "flushed quests buffer");
                }
                Ok(())
            }
        }
        .instrument(tracing::info_span!("quests_flusher")),
    );
}

pub fn spawn_invasions_flusher(
    store: StagingStore,
    pool: MySqlPool,
    cfg: BufferConfig,
    threshold: i64,
    cancel: CancellationToken,
) {
    if !cfg.enabled {
        info!("invasions flusher disabled by config");
        return;
    }
    tokio::spawn(
        async move {
            let mut cycle = 0u64;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(cfg.flush_interval) => {}
                    _ = cancel.cancelled() => {
                        info!("invasions flusher stopping, running final force_flush");
                        if let Err(e) = flush_once(&store, &pool, true, threshold).await {
                            error!("invasions final force_flush failed: {e:#}");
                        }
                        return;
                    }
                }
                if !probe(&store).await {
                    warn!("staging store unreachable, skipping invasions flush cycle");
                    continue;
                }
                cycle += 1;
                let force = cycle % FORCE_FLUSH_EVERY == 0;
                if let Err(e) = flush_once(&store, &pool, force, threshold).await {
                    error!("invasions flush cycle failed: {e:#}");
                }
            }

            async fn flush_once(store: &StagingStore, pool: &MySqlPool, force: bool, threshold: i64) -> anyhow::Result<()> {
                let rows = if force {
                    invasions::force_flush(store).await?
                } else {
                    invasions::flush_if_ready(store, threshold).await?
                };
                if !rows.is_empty() {
                    let n = bulk::invasions::bulk_upsert(pool.clone(), rows).await?;
                    info!(rows = n, "flushed invasions buffer");
                }
                Ok(())
            }
        }
        .instrument(tracing::info_span!("invasions_flusher")),
    );
}
