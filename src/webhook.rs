//! `POST /webhook` (spec.md §6): accepts a single event object or an array
//! of them, `{type: "pokemon"|"raid"|"quest"|"invasion", ...}`. Always
//! responds `200 OK` with a JSON summary — per-event failures are logged
//! and reported in the body, never surfaced as a non-2xx status, so a
//! malformed event from one scanner can't make the sender believe the
//! whole batch failed.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::config::AppConfig;
use crate::event_parser::{self, NullTimeSeriesSink, TimeSeriesSink};
use crate::leader_election::LeaderStatus;
use crate::models::{InvasionEvent, PokemonEvent, QuestEvent, RaidEvent};
use crate::staging_store::StagingStore;

#[derive(Clone)]
pub struct AppState {
    pub store: StagingStore,
    pub config: Arc<AppConfig>,
    pub sink: Arc<dyn TimeSeriesSink>,
    pub leader: Option<LeaderStatus>,
}

impl AppState {
    pub fn new(store: StagingStore, config: Arc<AppConfig>) -> Self {
        Self { store, config, sink: Arc::new(NullTimeSeriesSink), leader: None }
    }

    /// Attaches a leader-status handle so `/healthz` can report
    /// leader/follower state alongside store connectivity.
    pub fn with_leader_status(mut self, leader: LeaderStatus) -> Self {
        self.leader = Some(leader);
        self
    }
}

#[derive(Debug, Default, Serialize)]
struct WebhookSummary {
    processed: usize,
    ignored: usize,
    errors: Vec<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/healthz", get(handle_healthz))
        .with_state(state)
}

async fn handle_webhook(State(state): State<AppState>, Json(body): Json<serde_json::Value>) -> impl IntoResponse {
    if state.store.ping().await.is_err() {
        warn!("staging store unreachable, dropping webhook batch");
        let events = body.as_array().map(|a| a.len()).unwrap_or(1);
        return Json(WebhookSummary { processed: 0, ignored: events, errors: vec!["staging store unreachable".to_string()] });
    }

    let events: Vec<serde_json::Value> = match body {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };

    let mut summary = WebhookSummary::default();
    for event in events {
        match dispatch_one(&state, &event).await {
            Ok(true) => summary.processed += 1,
            Ok(false) => summary.ignored += 1,
            Err(e) => {
                warn!(error = %e, "webhook event failed");
                summary.errors.push(e);
                summary.ignored += 1;
            }
        }
    }
    Json(summary)
}

/// Returns `Ok(true)` if the event was processed, `Ok(false)` if it was a
/// recognized-but-uninteresting type, `Err` with a human-readable message
/// on malformed input (never propagated as an HTTP error).
async fn dispatch_one(state: &AppState, event: &serde_json::Value) -> Result<bool, String> {
    let kind = event.get("type").and_then(|v| v.as_str()).ok_or_else(|| "missing \"type\" field".to_string())?;

    match kind {
        "pokemon" => {
            let parsed: PokemonEvent = serde_json::from_value(event.clone()).map_err(|e| format!("invalid pokemon event: {e}"))?;
            event_parser::process_pokemon_event(&state.store, &state.config, state.sink.as_ref(), &parsed).await;
            Ok(true)
        }
        "raid" => {
            let parsed: RaidEvent = serde_json::from_value(event.clone()).map_err(|e| format!("invalid raid event: {e}"))?;
            event_parser::process_raid_event(&state.store, &state.config, state.sink.as_ref(), &parsed).await;
            Ok(true)
        }
        "quest" => {
            let parsed: QuestEvent = serde_json::from_value(event.clone()).map_err(|e| format!("invalid quest event: {e}"))?;
            event_parser::process_quest_event(&state.store, &state.config, state.sink.as_ref(), &parsed).await;
            Ok(true)
        }
        "invasion" => {
            let parsed: InvasionEvent = serde_json::from_value(event.clone()).map_err(|e| format!("invalid invasion event: {e}"))?;
            event_parser::process_invasion_event(&state.store, &state.config, state.sink.as_ref(), &parsed).await;
            Ok(true)
        }
        other => {
            warn!(kind = other, "ignoring unrecognized webhook event type");
            Ok(false)
        }
    }
}

async fn handle_healthz(State(state): State<AppState>) -> impl IntoResponse {
    let store_ok = state.store.ping().await.is_ok();
    let status = if store_ok { axum::http::StatusCode::OK } else { axum::http::StatusCode::SERVICE_UNAVAILABLE };
    let role = match state.leader.as_ref().map(|l| l.is_leader()) {
        Some(true) => "leader",
        Some(false) => "follower",
        None => "unknown",
    };
    (status, Json(serde_json::json!({ "staging_store": store_ok, "role": role })))
}
