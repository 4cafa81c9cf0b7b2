//! Raw quest-event buffer: pipe-delimited lines appended to a list.
//!
//! Line shape (13 fields):
//! `pokestop|name|lat|lon|mode|task_type|area_id|first_seen|kind|item_id|item_amount|poke_id|poke_form`
//!
//! `mode`: 0=normal, 1=ar. `kind`: 0=item, 1=pokemon — only the fields for
//! the resolved reward kind are populated, the rest are zeroed.

use anyhow::Result;

use crate::models::{QuestEvent, QuestRewardKind, sanitize_name, valid_coords};
use crate::staging_store::StagingStore;

use super::drain_list;

const KEY: &str = "buffer:quest_events";

#[derive(Debug, Clone)]
pub struct QuestRow {
    pub pokestop: String,
    pub pokestop_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub mode: i32,
    pub task_type: i32,
    pub area_id: i32,
    pub first_seen: i64,
    pub kind: i32,
    pub item_id: i32,
    pub item_amount: i32,
    pub poke_id: i32,
    pub poke_form: String,
}

pub async fn increment_event(store: &StagingStore, event: &QuestEvent) -> Result<Option<i64>> {
    if event.task_type() == 0 {
        return Ok(None);
    }
    let (Some(lat), Some(lon)) = (event.latitude, event.longitude) else {
        return Ok(None);
    };
    if !valid_coords(lat, lon) {
        return Ok(None);
    }
    let Some(reward) = event.reward() else {
        return Ok(None);
    };
    let kind = match reward.kind {
        QuestRewardKind::Pokemon => 1,
        QuestRewardKind::Item => 0,
    };
    let line = format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
        event.pokestop_id,
        sanitize_name(event.pokestop_name.as_deref()),
        lat,
        lon,
        event.mode(),
        event.task_type(),
        event.area_id,
        event.first_seen,
        kind,
        reward.item_id,
        reward.item_amount,
        reward.poke_id,
        reward.poke_form,
    );
    store.rpush(KEY, &line).await?;
    Ok(Some(store.llen(KEY).await?))
}

fn parse_row(line: &str) -> Option<QuestRow> {
    let parts: Vec<&str> = line.splitn(13, '|').collect();
    if parts.len() != 13 {
        return None;
    }
    Some(QuestRow {
        pokestop: parts[0].to_string(),
        pokestop_name: parts[1].to_string(),
        latitude: parts[2].parse().ok()?,
        longitude: parts[3].parse().ok()?,
        mode: parts[4].parse().ok()?,
        task_type: parts[5].parse().ok()?,
        area_id: parts[6].parse().ok()?,
        first_seen: parts[7].parse().ok()?,
        kind: parts[8].parse().ok()?,
        item_id: parts[9].parse().ok()?,
        item_amount: parts[10].parse().ok()?,
        poke_id: parts[11].parse().ok()?,
        poke_form: parts[12].to_string(),
    })
}

async fn drain(store: &StagingStore, force: bool) -> Result<Vec<QuestRow>> {
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
        metrics::counter!("buffer.malformed", "buffer" => "quest").increment(malformed);
    }
    metrics::counter!("buffer.drain.rows", "buffer" => "quest").increment(out.len() as u64);
    Ok(out)
}

pub async fn flush_if_ready(store: &StagingStore, threshold: i64) -> Result<Vec<QuestRow>> {
    if store.llen(KEY).await.unwrap_or(0) < threshold {
        return Ok(Vec::new());
    }
    drain(store, false).await
}

pub async fn force_flush(store: &StagingStore) -> Result<Vec<QuestRow>> {
    drain(store, true).await
}

/// Recovers rows left behind in a stale `:flushing`/`:force_flushing` key
/// by a crashed former leader.
pub async fn recover_stale(store: &StagingStore) -> Result<Vec<QuestRow>> {
    let lines = super::recover_stale_list(store, KEY).await?;
    Ok(lines.iter().filter_map(|line| parse_row(line)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pokemon_reward_line() {
        let line = "stop1|Fountain|40.1|-74.2|1|7|3|1690000000|1|0|0|25|0";
        let row = parse_row(line).unwrap();
        assert_eq!(row.mode, 1);
        assert_eq!(row.kind, 1);
        assert_eq!(row.poke_id, 25);
    }

    #[test]
    fn parses_item_reward_line() {
        let line = "stop1|Fountain|40.1|-74.2|0|2|3|1690000000|0|1|5|0|";
        assert!(parse_row(line).is_some());
    }
}
