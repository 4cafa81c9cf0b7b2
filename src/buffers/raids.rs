//! Raw raid-event buffer: newline-free pipe-delimited lines appended to a
//! list, drained in batches rather than aggregated in place.
//!
//! Line shape (13 fields):
//! `gym|gym_name|lat|lon|raid_pokemon|raid_form|raid_level|raid_team|raid_costume|raid_is_exclusive|raid_ex_raid_eligible|area_id|first_seen`

use anyhow::Result;

use crate::models::{RaidEvent, sanitize_form, sanitize_name, valid_coords};
use crate::staging_store::StagingStore;

use super::drain_list;

const KEY: &str = "buffer:raid_events";

#[derive(Debug, Clone)]
pub struct RaidRow {
    pub gym: String,
    pub gym_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub raid_pokemon: i32,
    pub raid_form: String,
    pub raid_level: i32,
    pub raid_team: i32,
    pub raid_costume: String,
    pub raid_is_exclusive: i32,
    pub raid_ex_raid_eligible: i32,
    pub area_id: i32,
    pub first_seen: i64,
}

/// Events with missing/null-island/out-of-range coordinates are dropped
/// before ever reaching the buffer, matching the buffer's own coordinate
/// gate.
pub async fn increment_event(store: &StagingStore, event: &RaidEvent) -> Result<Option<i64>> {
    let (Some(lat), Some(lon)) = (event.raid_latitude, event.raid_longitude) else {
        return Ok(None);
    };
    if !valid_coords(lat, lon) {
        return Ok(None);
    }
    let line = format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
        event.raid_gym_id,
        sanitize_name(event.raid_gym_name.as_deref()),
        lat,
        lon,
        event.raid_pokemon.unwrap_or(0),
        sanitize_form(event.raid_form.as_deref()),
        event.raid_level.unwrap_or(0),
        event.raid_team_id.unwrap_or(0),
        sanitize_form(event.raid_costume.as_deref()),
        event.raid_is_exclusive.unwrap_or(0),
        event.raid_ex_raid_eligible.unwrap_or(0),
        event.area_id,
        event.raid_first_seen,
    );
    store.rpush(KEY, &line).await?;
    Ok(Some(store.llen(KEY).await?))
}

fn parse_row(line: &str) -> Option<RaidRow> {
    let parts: Vec<&str> = line.splitn(13, '|').collect();
    if parts.len() != 13 {
        return None;
    }
    Some(RaidRow {
        gym: parts[0].to_string(),
        gym_name: parts[1].to_string(),
        latitude: parts[2].parse().ok()?,
        longitude: parts[3].parse().ok()?,
        raid_pokemon: parts[4].parse().ok()?,
        raid_form: parts[5].to_string(),
        raid_level: parts[6].parse().ok()?,
        raid_team: parts[7].parse().ok()?,
        raid_costume: parts[8].to_string(),
        raid_is_exclusive: parts[9].parse().ok()?,
        raid_ex_raid_eligible: parts[10].parse().ok()?,
        area_id: parts[11].parse().ok()?,
        first_seen: parts[12].parse().ok()?,
    })
}

async fn drain(store: &StagingStore, force: bool) -> Result<Vec<RaidRow>> {
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
        metrics::counter!("buffer.malformed", "buffer" => "raid").increment(malformed);
    }
    metrics::counter!("buffer.drain.rows", "buffer" => "raid").increment(out.len() as u64);
    Ok(out)
}

pub async fn flush_if_ready(store: &StagingStore, threshold: i64) -> Result<Vec<RaidRow>> {
    if store.llen(KEY).await.unwrap_or(0) < threshold {
        return Ok(Vec::new());
    }
    drain(store, false).await
}

pub async fn force_flush(store: &StagingStore) -> Result<Vec<RaidRow>> {
    drain(store, true).await
}

/// Recovers rows left behind in a stale `:flushing`/`:force_flushing` key
/// by a crashed former leader.
pub async fn recover_stale(store: &StagingStore) -> Result<Vec<RaidRow>> {
    let lines = super::recover_stale_list(store, KEY).await?;
    Ok(lines.iter().filter_map(|line| parse_row(line)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_thirteen_field_line() {
        let line = "gym1|Town Hall|40.1|-74.2|150|0|5|1|0|0|1|3|1690000000";
        let row = parse_row(line).unwrap();
        assert_eq!(row.gym, "gym1");
        assert_eq!(row.gym_name, "Town Hall");
        assert_eq!(row.raid_level, 5);
        assert_eq!(row.first_seen, 1690000000);
    }

    #[test]
    fn rejects_short_line() {
        assert!(parse_row("gym1|Town Hall|40.1").is_none());
    }
}
