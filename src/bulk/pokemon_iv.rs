use anyhow::{Context, Result};
use diesel::RunQueryDsl;
use diesel::connection::Connection;
use tracing::debug;

use crate::buffers::pokemon_iv::PokemonIvRow;
use crate::relational_store::{MySqlPool, sql_escape_string, with_deadlock_retry};

use super::{CHUNK_SIZE, MAX_RETRIES};

/// Upserts a batch of drained IV rows: spawnpoint coordinates plus the
/// monthly aggregate. Returns the number of input rows consumed.
pub async fn bulk_upsert(pool: MySqlPool, mut rows: Vec<PokemonIvRow>) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    let total = rows.len();
    // Stable lock acquisition order across concurrent drains reduces deadlocks.
    rows.sort_by(|a, b| a.spawnpoint.cmp(&b.spawnpoint));

    tokio::task::spawn_blocking(move || {
        for chunk in rows.chunks(CHUNK_SIZE) {
            with_deadlock_retry(MAX_RETRIES, || apply_chunk(&pool, chunk))?;
        }
        Ok(total)
    })
    .await
    .context("bulk_upsert(pokemon_iv) task panicked")?
}

fn apply_chunk(pool: &MySqlPool, chunk: &[PokemonIvRow]) -> Result<()> {
    let mut conn = pool.get().context("checkout connection for pokemon_iv upsert")?;

    conn.transaction(|conn| -> Result<()> {
        diesel::sql_query(
            "CREATE TEMPORARY TABLE IF NOT EXISTS tmp_iv (
                spawnpoint BIGINT UNSIGNED NOT NULL,
                latitude DOUBLE NULL,
                longitude DOUBLE NULL,
                pokemon_id INT NOT NULL,
                form VARCHAR(15) NOT NULL,
                iv_bucket TINYINT UNSIGNED NOT NULL,
                area_id SMALLINT UNSIGNED NOT NULL,
                month_year SMALLINT UNSIGNED NOT NULL,
                inc INT NOT NULL,
                INDEX idx_tmp_iv_sp (spawnpoint)
            ) ENGINE=InnoDB",
        )
        .execute(conn)?;

        let values: Vec<String> = chunk
            .iter()
            .map(|r| {
                let lat = r.latitude.map(|v| v.to_string()).unwrap_or_else(|| "NULL".to_string());
                let lon = r.longitude.map(|v| v.to_string()).unwrap_or_else(|| "NULL".to_string());
                // spawnpoint arrives as a hex string; the dimension table key is numeric.
                format!(
                    "({}, {lat}, {lon}, {}, {}, {}, {}, {}, {})",
                    u64::from_str_radix(&r.spawnpoint, 16).unwrap_or(0),
                    r.pokemon_id,
                    sql_escape_string(&r.form),
                    r.iv_bucket,
                    r.area_id,
                    r.month_year.parse::<u16>().unwrap_or(0),
                    r.count,
                )
            })
            .collect();
        diesel::sql_query(format!("INSERT INTO tmp_iv VALUES {}", values.join(","))).execute(conn)?;

        diesel::sql_query(
            "INSERT IGNORE INTO spawnpoints (spawnpoint, latitude, longitude)
             SELECT t.spawnpoint, ANY_VALUE(t.latitude), ANY_VALUE(t.longitude)
             FROM tmp_iv t
             WHERE t.latitude IS NOT NULL AND t.longitude IS NOT NULL
             GROUP BY t.spawnpoint",
        )
        .execute(conn)?;

        diesel::sql_query(
            "UPDATE spawnpoints s
             JOIN (
                 SELECT t.spawnpoint, ANY_VALUE(t.latitude) AS latitude, ANY_VALUE(t.longitude) AS longitude
                 FROM tmp_iv t
                 WHERE t.latitude IS NOT NULL AND t.longitude IS NOT NULL
                 GROUP BY t.spawnpoint
             ) x ON x.spawnpoint = s.spawnpoint
             SET s.latitude = x.latitude, s.longitude = x.longitude
             WHERE s.latitude <> x.latitude OR s.longitude <> x.longitude",
        )
        .execute(conn)?;

        diesel::sql_query(
            "INSERT INTO aggregated_pokemon_iv_monthly (
                spawnpoint, pokemon_id, form, iv_bucket, area_id, month_year, total_count
            )
            SELECT t.spawnpoint, t.pokemon_id, t.form, t.iv_bucket, t.area_id, t.month_year, SUM(t.inc)
            FROM tmp_iv t
            GROUP BY t.spawnpoint, t.pokemon_id, t.form, t.iv_bucket, t.area_id, t.month_year
            ON DUPLICATE KEY UPDATE total_count = total_count + VALUES(total_count)",
        )
        .execute(conn)?;

        diesel::sql_query("DROP TEMPORARY TABLE IF EXISTS tmp_iv").execute(conn)?;

        debug!(rows = chunk.len(), "applied pokemon_iv chunk");
        Ok(())
    })
}
