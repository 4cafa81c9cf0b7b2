//! Pokestop-count refresher: for each cached geofence, counts pokestops
//! inside its polygon against the upstream pokestop store and publishes
//! `{areas, grand_total}` into [`crate::shared_state::SharedState`].
//!
//! Grounded in `sql/tasks/golbat_pokestops.py`'s `refresh_pokestops`: builds
//! `POLYGON((lon lat, ...))` WKT from each geofence's first ring and runs
//! `SELECT COUNT(*) FROM pokestop WHERE ST_CONTAINS(ST_GeomFromText(?),
//! POINT(lon, lat))`. The upstream pokestop store is reachable through the
//! same MySQL-compatible engine as the relational store (`SPEC_FULL.md`
//! §4.9), so this reuses `relational_store::MySqlPool` rather than a
//! second store client.

use anyhow::{Context, Result};
use diesel::RunQueryDsl;
use diesel::sql_types::Text;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::relational_store::MySqlPool;
use crate::shared_state::SharedState;

use super::with_bounded_retry;

const RETRY_ATTEMPTS: u32 = 5;
const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, diesel::QueryableByName)]
struct CountRow {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    cnt: i64,
}

/// Builds `POLYGON((lon lat, lon lat, ...))` from a GeoJSON-style ring
/// (`[[lon, lat], ...]`). Returns `None` if the ring is empty or malformed.
fn polygon_wkt(coordinates: &serde_json::Value) -> Option<String> {
    let ring = coordinates.as_array()?.first()?.as_array()?;
    if ring.is_empty() {
        return None;
    }
    let mut parts = Vec::with_capacity(ring.len());
    for point in ring {
        let pair = point.as_array()?;
        let lon = pair.first()?.as_f64()?;
        let lat = pair.get(1)?.as_f64()?;
        parts.push(format!("{lon} {lat}"));
    }
    Some(format!("POLYGON(({}))", parts.join(", ")))
}

fn count_in_polygon(pool: &MySqlPool, wkt: &str) -> Result<i64> {
    let mut conn = pool.get().context("checkout connection for pokestop count")?;
    let row: CountRow = diesel::sql_query(
        "SELECT COUNT(*) AS cnt FROM pokestop WHERE ST_CONTAINS(ST_GeomFromText(?), POINT(lon, lat))",
    )
    .bind::<Text, _>(wkt)
    .get_result(&mut conn)
    .context("counting pokestops in polygon")?;
    Ok(row.cnt)
}

/// One refresh cycle: reads cached geofences, counts each, publishes the
/// result. A geofence whose polygon can't be built, or whose count query
/// exhausts retries, contributes 0 and is logged rather than aborting the
/// whole cycle.
pub async fn refresh_once(pool: &MySqlPool, shared: &SharedState) -> Result<()> {
    let Some(cached) = shared.get_geofences().await? else {
        warn!("no geofences cached yet; skipping pokestop count refresh");
        return Ok(());
    };
    let Some(geofences) = cached.value.as_array() else {
        warn!("cached geofences value is not an array; skipping pokestop count refresh");
        return Ok(());
    };

    let mut areas = BTreeMap::new();
    let mut grand_total = 0i64;

    for geofence in geofences {
        let Some(name) = geofence.get("name").and_then(|v| v.as_str()) else {
            continue;
        };
        let Some(coordinates) = geofence.get("coordinates") else {
            warn!(area = name, "geofence has no coordinates, skipping");
            continue;
        };
        let Some(wkt) = polygon_wkt(coordinates) else {
            warn!(area = name, "could not build polygon for geofence, skipping");
            continue;
        };

        let pool = pool.clone();
        let wkt_owned = wkt.clone();
        let count = with_bounded_retry(RETRY_ATTEMPTS, RETRY_DELAY, move || {
            let pool = pool.clone();
            let wkt = wkt_owned.clone();
            async move { tokio::task::spawn_blocking(move || count_in_polygon(&pool, &wkt)).await.context("count task panicked")? }
        })
        .await
        .unwrap_or_else(|e| {
            warn!(area = name, error = %e, "max retries exceeded counting pokestops, using 0");
            0
        });

        info!(area = name, count, "counted pokestops inside geofence");
        areas.insert(name.to_string(), count);
        grand_total += count;
    }

    let result = serde_json::json!({ "areas": areas, "grand_total": grand_total });
    shared.set_pokestops(result).await?;
    Ok(())
}

pub fn spawn_pokestop_count_refresh_loop(
    pool: MySqlPool,
    shared: SharedState,
    interval: Duration,
    cancel: CancellationToken,
) {
    super::spawn_refresh_loop("pokestop_counts", interval, Duration::from_secs(1), cancel, move || {
        let pool = pool.clone();
        let shared = shared.clone();
        async move { refresh_once(&pool, &shared).await }
    });
}
