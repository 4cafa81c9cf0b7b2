use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diesel::RunQueryDsl;
use diesel::connection::Connection;
use tracing::debug;

use crate::buffers::invasions::InvasionRow;
use crate::relational_store::{MySqlPool, sql_escape_string, with_deadlock_retry};

use super::{CHUNK_SIZE, MAX_RETRIES};

pub async fn bulk_upsert(pool: MySqlPool, mut rows: Vec<InvasionRow>) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    let total = rows.len();
    rows.sort_by(|a, b| a.pokestop.cmp(&b.pokestop));

    tokio::task::spawn_blocking(move || {
        for chunk in rows.chunks(CHUNK_SIZE) {
            with_deadlock_retry(MAX_RETRIES, || apply_chunk(&pool, chunk))?;
        }
        Ok(total)
    })
    .await
    .context("bulk_upsert(invasions) task panicked")?
}

fn apply_chunk(pool: &MySqlPool, chunk: &[InvasionRow]) -> Result<()> {
    let mut conn = pool.get().context("checkout connection for invasions upsert")?;

    conn.transaction(|conn| -> Result<()> {
        diesel::sql_query(
            "CREATE TEMPORARY TABLE IF NOT EXISTS tmp_invasions (
                pokestop VARCHAR(50) NOT NULL,
                pokestop_name VARCHAR(255) NOT NULL,
                latitude DOUBLE NOT NULL,
                longitude DOUBLE NOT NULL,
                display_type INT NOT NULL,
                `character` INT NOT NULL,
                grunt INT NOT NULL,
                confirmed TINYINT NOT NULL,
                area_id SMALLINT UNSIGNED NOT NULL,
                month_year SMALLINT UNSIGNED NOT NULL,
                day_date DATE NOT NULL,
                seen_at DATETIME NOT NULL,
                INDEX idx_tmp_invasions_pokestop (pokestop),
                INDEX idx_tmp_invasions_month (month_year)
            ) ENGINE=InnoDB",
        )
        .execute(conn)?;

        let values: Vec<String> = chunk
            .iter()
            .map(|r| {
                let seen_at = DateTime::<Utc>::from_timestamp(r.first_seen, 0).unwrap_or_else(Utc::now);
                format!(
                    "({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {})",
                    sql_escape_string(&r.pokestop),
                    sql_escape_string(&r.pokestop_name),
                    r.latitude,
                    r.longitude,
                    r.display_type,
                    r.character,
                    r.grunt,
                    r.confirmed,
                    r.area_id,
                    seen_at.format("%y%m"),
                    sql_escape_string(&seen_at.format("%Y-%m-%d").to_string()),
                    sql_escape_string(&seen_at.format("%Y-%m-%d %H:%M:%S").to_string()),
                )
            })
            .collect();
        diesel::sql_query(format!("INSERT INTO tmp_invasions VALUES {}", values.join(","))).execute(conn)?;

        diesel::sql_query(
            "INSERT IGNORE INTO pokestops (pokestop, pokestop_name, latitude, longitude)
             SELECT t.pokestop, ANY_VALUE(t.pokestop_name), ANY_VALUE(t.latitude), ANY_VALUE(t.longitude)
             FROM tmp_invasions t
             GROUP BY t.pokestop",
        )
        .execute(conn)?;

        diesel::sql_query(
            "UPDATE pokestops p
             JOIN (
                 SELECT t.pokestop, ANY_VALUE(t.pokestop_name) AS pokestop_name,
                        ANY_VALUE(t.latitude) AS latitude, ANY_VALUE(t.longitude) AS longitude
                 FROM tmp_invasions t
                 GROUP BY t.pokestop
             ) x ON x.pokestop = p.pokestop
             SET p.pokestop_name = x.pokestop_name, p.latitude = x.latitude, p.longitude = x.longitude
             WHERE p.pokestop_name <> x.pokestop_name OR p.latitude <> x.latitude OR p.longitude <> x.longitude",
        )
        .execute(conn)?;

        diesel::sql_query(
            "INSERT INTO aggregated_invasions (
                pokestop, display_type, `character`, grunt, confirmed, area_id, month_year, total_count
            )
            SELECT t.pokestop, t.display_type, t.`character`, t.grunt, t.confirmed, t.area_id, t.month_year, COUNT(*)
            FROM tmp_invasions t
            GROUP BY t.pokestop, t.display_type, t.`character`, t.grunt, t.confirmed, t.area_id, t.month_year
            ON DUPLICATE KEY UPDATE total_count = total_count + VALUES(total_count)",
        )
        .execute(conn)?;

        diesel::sql_query(
            "INSERT IGNORE INTO invasions_daily_events (
                day_date, pokestop, display_type, `character`, grunt, confirmed, area_id, seen_at
            )
            SELECT t.day_date, t.pokestop, t.display_type, t.`character`, t.grunt, t.confirmed, t.area_id, t.seen_at
            FROM tmp_invasions t",
        )
        .execute(conn)?;

        diesel::sql_query("DROP TEMPORARY TABLE IF EXISTS tmp_invasions").execute(conn)?;

        debug!(rows = chunk.len(), "applied invasions chunk");
        Ok(())
    })
}
