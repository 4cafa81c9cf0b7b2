//! Aggregated Pokémon IV buffer: one hash counting occurrences of
//! `{spawnpoint}_{pokemon_id}_{form}_{iv_bucket}_{area_id}_{YYMM}`, plus a
//! companion hash caching each spawnpoint's coordinates once.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::iv_bucket::get_iv_bucket;
use crate::models::PokemonEvent;
use crate::staging_store::StagingStore;

use super::drain_hash;

const KEY: &str = "buffer:agg_pokemon_iv";
const COORDS_KEY: &str = "buffer:agg_pokemon_iv:coords";

#[derive(Debug, Clone)]
pub struct PokemonIvRow {
    pub spawnpoint: String,
    pub pokemon_id: i32,
    pub form: String,
    pub iv_bucket: u8,
    pub area_id: i32,
    pub month_year: String,
    pub count: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

fn month_year(first_seen: i64) -> String {
    DateTime::<Utc>::from_timestamp(first_seen, 0)
        .unwrap_or_else(Utc::now)
        .format("%y%m")
        .to_string()
}

/// Records one occurrence, bumping the threshold check the caller should
/// use to decide whether to flush.
pub async fn increment_event(store: &StagingStore, event: &PokemonEvent) -> Result<i64> {
    let raw_iv = match event.iv {
        Some(iv) => iv,
        None => return Ok(0),
    };
    let bucket = get_iv_bucket(raw_iv);
    let ym = month_year(event.first_seen);
    let composite = format!(
        "{}_{}_{}_{}_{}_{}",
        event.spawnpoint,
        event.pokemon_id,
        event.form_or_default(),
        bucket,
        event.area_id,
        ym
    );

    if let (Some(lat), Some(lon)) = (event.latitude, event.longitude) {
        store.hsetnx(COORDS_KEY, &event.spawnpoint, &format!("{lat},{lon}")).await.ok();
    }

    store.hincrby(KEY, &composite, 1).await?;
    store.hlen(KEY).await
}

/// Parses one `{composite_key}: count` pair into a row, skipping malformed
/// keys rather than failing the whole drain.
fn parse_row(composite: &str, count: &str, coords: &std::collections::HashMap<String, (f64, f64)>) -> Option<PokemonIvRow> {
    let parts: Vec<&str> = composite.split('_').collect();
    if parts.len() != 6 {
        return None;
    }
    let count: i64 = count.parse().ok()?;
    let pokemon_id: i32 = parts[1].parse().ok()?;
    let iv_bucket: u8 = parts[3].parse().ok()?;
    let area_id: i32 = parts[4].parse().ok()?;
    let spawnpoint = parts[0].to_string();
    let (latitude, longitude) = coords
        .get(&spawnpoint)
        .map(|(lat, lon)| (Some(*lat), Some(*lon)))
        .unwrap_or((None, None));

    Some(PokemonIvRow {
        spawnpoint,
        pokemon_id,
        form: parts[2].to_string(),
        iv_bucket,
        area_id,
        month_year: parts[5].to_string(),
        count,
        latitude,
        longitude,
    })
}

async fn drain(store: &StagingStore, force: bool) -> Result<Vec<PokemonIvRow>> {
    let Some(rows) = drain_hash(store, KEY, force).await? else {
        return Ok(Vec::new());
    };

    let coords_rows = drain_hash(store, COORDS_KEY, force).await.unwrap_or(None).unwrap_or_default();
    let coords: std::collections::HashMap<String, (f64, f64)> = coords_rows
        .into_iter()
        .filter_map(|(sp, val)| {
            let (lat, lon) = val.split_once(',')?;
            Some((sp, (lat.parse().ok()?, lon.parse().ok()?)))
        })
        .collect();

    let mut malformed = 0u64;
    let mut out = Vec::with_capacity(rows.len());
    for (composite, count) in &rows {
        match parse_row(composite, count, &coords) {
            Some(row) => out.push(row),
            None => malformed += 1,
        }
    }
    if malformed > 0 {
        metrics::counter!("buffer.malformed", "buffer" => "pokemon_iv").increment(malformed);
    }
    metrics::counter!("buffer.drain.rows", "buffer" => "pokemon_iv").increment(out.len() as u64);
    Ok(out)
}

pub async fn flush_if_ready(store: &StagingStore, threshold: i64) -> Result<Vec<PokemonIvRow>> {
    if store.hlen(KEY).await.unwrap_or(0) < threshold {
        return Ok(Vec::new());
    }
    drain(store, false).await
}

pub async fn force_flush(store: &StagingStore) -> Result<Vec<PokemonIvRow>> {
    drain(store, true).await
}

/// Recovers rows left behind in a stale `:flushing`/`:force_flushing` key
/// by a crashed former leader. Coordinates are read from whatever is
/// currently cached in `COORDS_KEY` rather than a matching stale snapshot
/// of it, since the cache is rebuilt continuously and not itself part of
/// the at-least-once guarantee this recovers.
pub async fn recover_stale(store: &StagingStore) -> Result<Vec<PokemonIvRow>> {
    let rows = super::recover_stale_hash(store, KEY).await?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let coords_rows = store.hgetall(COORDS_KEY).await.unwrap_or_default();
    let coords: std::collections::HashMap<String, (f64, f64)> = coords_rows
        .into_iter()
        .filter_map(|(sp, val)| {
            let (lat, lon) = val.split_once(',')?;
            Some((sp, (lat.parse().ok()?, lon.parse().ok()?)))
        })
        .collect();
    Ok(rows.iter().filter_map(|(composite, count)| parse_row(composite, count, &coords)).collect())
}
