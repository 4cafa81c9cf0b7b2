//! Raw invasion-event buffer: pipe-delimited lines appended to a list.
//!
//! Line shape (10 fields):
//! `pokestop|pokestop_name|latitude|longitude|display_type|character|grunt|confirmed|area_id|first_seen`

use anyhow::Result;

use crate::models::{InvasionEvent, sanitize_name, valid_coords};
use crate::staging_store::StagingStore;

use super::drain_list;

const KEY: &str = "buffer:invasion_events";

#[derive(Debug, Clone)]
pub struct InvasionRow {
    pub pokestop: String,
    pub pokestop_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub display_type: i32,
    pub character: i32,
    pub grunt: i32,
    pub confirmed: i32,
    pub area_id: i32,
    pub first_seen: i64,
}

pub async fn increment_event(store: &StagingStore, event: &InvasionEvent) -> Result<Option<i64>> {
    let (Some(lat), Some(lon)) = (event.invasion_latitude, event.invasion_longitude) else {
        return Ok(None);
    };
    if !valid_coords(lat, lon) {
        return Ok(None);
    }
    let line = format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
        event.invasion_pokestop_id,
        sanitize_name(event.invasion_pokestop_name.as_deref()),
        lat,
        lon,
        event.invasion_type.unwrap_or(0),
        event.invasion_character.unwrap_or(0),
        event.invasion_grunt_type.unwrap_or(0),
        event.invasion_confirmed.unwrap_or(0),
        event.area_id,
        event.invasion_first_seen,
    );
    store.rpush(KEY, &line).await?;
    Ok(Some(store.llen(KEY).await?))
}

fn parse_row(line: &str) -> Option<InvasionRow> {
    let parts: Vec<&str> = line.splitn(10, '|').collect();
    if parts.len() != 10 {
        return None;
    }
    Some(InvasionRow {
        pokestop: parts[0].to_string(),
        pokestop_name: parts[1].to_string(),
        latitude: parts[2].parse().ok()?,
        longitude: parts[3].parse().ok()?,
        display_type: parts[4].parse().ok()?,
        character: parts[5].parse().ok()?,
        grunt: parts[6].parse().ok()?,
        confirmed: parts[7].parse().ok()?,
        area_id: parts[8].parse().ok()?,
        first_seen: parts[9].parse().ok()?,
    })
}

async fn drain(store: &StagingStore, force: bool) -> Result<Vec<InvasionRow>> {
    let Some(lines) = drain_list(store, KEY, force).await? else {
        return Ok(Vec::new());
    };
    let mut malformed = 0u64;
    let mut out = Vec::with_capacity(lines.len());
    for line in &lines {
        match parse_row(line) {
            Some(row) => out.push(row),
            None => malformed += 1,
        }
    }
    if malformed > 0 {
        metrics::counter!("buffer.malformed", "buffer" => "invasion").increment(malformed);
    }
    metrics::counter!("buffer.drain.rows", "buffer" => "invasion").increment(out.len() as u64);
    Ok(out)
}

pub async fn flush_if_ready(store: &StagingStore, threshold: i64) -> Result<Vec<InvasionRow>> {
    if store.llen(KEY).await.unwrap_or(0) < threshold {
        return Ok(Vec::new());
    }
    drain(store, false).await
}

pub async fn force_flush(store: &StagingStore) -> Result<Vec<InvasionRow>> {
    drain(store, true).await
}

/// Recovers rows left behind in a stale `:flushing`/`:force_flushing` key
/// by a crashed former leader.
pub async fn recover_stale(store: &StagingStore) -> Result<Vec<InvasionRow>> {
    let lines = super::recover_stale_list(store, KEY).await?;
    Ok(lines.iter().filter_map(|line| parse_row(line)).collect())
}
