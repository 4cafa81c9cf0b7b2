//! Aggregated shiny-rate buffer: one hash counting occurrences of
//! `{username}|{pokemon_id}|{form}|{shiny}|{area_id}|{YYMM}`.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{PokemonEvent, sanitize_username};
use crate::staging_store::StagingStore;

use super::drain_hash;

const KEY: &str = "buffer:agg_shiny_rates_hash";

#[derive(Debug, Clone)]
pub struct ShinyRow {
    pub username: String,
    pub pokemon_id: i32,
    pub form: String,
    pub shiny: u8,
    pub area_id: i32,
    pub month_year: String,
    pub count: i64,
}

fn month_year(first_seen: i64) -> String {
    DateTime::<Utc>::from_timestamp(first_seen, 0)
        .unwrap_or_else(Utc::now)
        .format("%y%m")
        .to_string()
}

pub async fn increment_event(store: &StagingStore, event: &PokemonEvent) -> Result<i64> {
    let Some(username) = event.username.as_deref() else {
        return Ok(0);
    };
    let shiny = event.shiny.unwrap_or(0);
    let ym = month_year(event.first_seen);
    let composite = format!(
        "{}|{}|{}|{}|{}|{}",
        sanitize_username(username),
        event.pokemon_id,
        event.form_or_default(),
        shiny,
        event.area_id,
        ym
    );
    store.hincrby(KEY, &composite, 1).await?;
    store.hlen(KEY).await
}

fn parse_row(composite: &str, count: &str) -> Option<ShinyRow> {
    let parts: Vec<&str> = composite.split('|').collect();
    if parts.len() != 6 {
        return None;
    }
    Some(ShinyRow {
        username: parts[0].to_string(),
        pokemon_id: parts[1].parse().ok()?,
        form: parts[2].to_string(),
        shiny: parts[3].parse().ok()?,
        area_id: parts[4].parse().ok()?,
        month_year: parts[5].to_string(),
        count: count.parse().ok()?,
    })
}

async fn drain(store: &StagingStore, force: bool) -> Result<Vec<ShinyRow>> {
    let Some(rows) = drain_hash(store, KEY, force).await? else {
        return Ok(Vec::new());
    };
    let mut malformed = 0u64;
    let mut out = Vec::with_capacity(rows.len());
    for (composite, count) in &rows {
        match parse_row(composite, count) {
            Some(row) => out.push(row),
            None => malformed += 1,
        }
    }
    if malformed > 0 {
        metrics::counter!("buffer.malformed", "buffer" => "shiny").increment(malformed);
    }
    metrics::counter!("buffer.drain.rows", "buffer" => "shiny").increment(out.len() as u64);
    Ok(out)
}

pub async fn flush_if_ready(store: &StagingStore, threshold: i64) -> Result<Vec<ShinyRow>> {
    if store.hlen(KEY).await.unwrap_or(0) < threshold {
        return Ok(Vec::new());
    }
    drain(store, false).await
}

pub async fn force_flush(store: &StagingStore) -> Result<Vec<ShinyRow>> {
    drain(store, true).await
}

/// Recovers rows left behind in a stale `:flushing`/`:force_flushing` key
/// by a crashed former leader.
pub async fn recover_stale(store: &StagingStore) -> Result<Vec<ShinyRow>> {
    let rows = super::recover_stale_hash(store, KEY).await?;
    Ok(rows.iter().filter_map(|(composite, count)| parse_row(composite, count)).collect())
}
