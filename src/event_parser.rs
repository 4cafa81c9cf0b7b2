//! Per-event entrypoint (C11), called once per filtered webhook event.
//!
//! Four independent functions, one per entity family, matching
//! `webhook/parser_data.py`'s four top-level functions rather than a single
//! dispatcher with a shared branch (see Open Question #1 in `SPEC_FULL.md`).
//! Each is stateless: it enqueues the out-of-scope time-series update via
//! [`TimeSeriesSink`], then calls its matching `buffers::*::increment_event`
//! if the relevant aggregation flag is enabled. Never touches the
//! relational store directly.
//!
//! "Obtain a C1 client, log and drop if unavailable" is handled one layer
//! up, at the webhook handler: it holds a [`crate::staging_store::StagingStore`]
//! built once at startup and probes it with `ping()` before dispatching here,
//! the same pattern the flushers use before a drain cycle.

use tracing::warn;

use crate::buffers::{invasions, pokemon_iv, quests, raids, shiny};
use crate::config::AppConfig;
use crate::models::{InvasionEvent, PokemonEvent, QuestEvent, RaidEvent};
use crate::staging_store::StagingStore;

/// Boundary for the time-series/counter subsystem this crate's buffers feed
/// alongside (`spec.md` §4.10: "out-of-scope subsystems; the contract is:
/// they accept an event dict + a pipeline handle and return update
/// summaries"). [`NullTimeSeriesSink`] satisfies the contract as a no-op so
/// every call site here is already wired for a real implementation to drop
/// in without touching the parser functions.
pub trait TimeSeriesSink: Send + Sync {
    fn enqueue_pokemon(&self, _event: &PokemonEvent) {}
    fn enqueue_raid(&self, _event: &RaidEvent) {}
    fn enqueue_quest(&self, _event: &QuestEvent) {}
    fn enqueue_invasion(&self, _event: &InvasionEvent) {}
}

pub struct NullTimeSeriesSink;

impl TimeSeriesSink for NullTimeSeriesSink {}

pub async fn process_pokemon_event(
    store: &StagingStore,
    cfg: &AppConfig,
    sink: &dyn TimeSeriesSink,
    event: &PokemonEvent,
) {
    sink.enqueue_pokemon(event);

    if cfg.pokemon_iv.enabled {
        if let Err(e) = pokemon_iv::increment_event(store, event).await {
            warn!(error = %e, "pokemon_iv increment_event failed");
        }
    }
    if cfg.shiny.enabled {
        if let Err(e) = shiny::increment_event(store, event).await {
            warn!(error = %e, "shiny increment_event failed");
        }
    }
}

pub async fn process_raid_event(store: &StagingStore, cfg: &AppConfig, sink: &dyn TimeSeriesSink, event: &RaidEvent) {
    sink.enqueue_raid(event);

    if cfg.raids.enabled {
        if let Err(e) = raids::increment_event(store, event).await {
            warn!(error = %e, "raids increment_event failed");
        }
    }
}

pub async fn process_quest_event(store: &StagingStore, cfg: &AppConfig, sink: &dyn TimeSeriesSink, event: &QuestEvent) {
    sink.enqueue_quest(event);

    if cfg.quests.enabled {
        if let Err(e) = quests::increment_event(store, event).await {
            warn!(error = %e, "quests increment_event failed");
        }
    }
}

pub async fn process_invasion_event(
    store: &StagingStore,
    cfg: &AppConfig,
    sink: &dyn TimeSeriesSink,
    event: &InvasionEvent,
) {
    sink.enqueue_invasion(event);

    if cfg.invasions.enabled {
        if let Err(e) = invasions::increment_event(store, event).await {
            warn!(error = %e, "invasions increment_event failed");
        }
    }
}
