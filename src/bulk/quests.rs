use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diesel::RunQueryDsl;
use diesel::connection::Connection;
use tracing::debug;

use crate::buffers::quests::QuestRow;
use crate::relational_store::{MySqlPool, sql_escape_string, with_deadlock_retry};

use super::{CHUNK_SIZE, MAX_RETRIES};

/// Quests have no monthly aggregate: every drained row becomes one row in
/// either the item or the pokemon daily-events table, split by `kind`.
/// Returns the number of rows actually inserted (affected rows from the two
/// `INSERT IGNORE`s), since there is no aggregate path here to count input
/// rows against.
pub async fn bulk_insert(pool: MySqlPool, mut rows: Vec<QuestRow>) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    rows.sort_by(|a, b| a.pokestop.cmp(&b.pokestop));

    tokio::task::spawn_blocking(move || {
        let mut inserted = 0usize;
        for chunk in rows.chunks(CHUNK_SIZE) {
            inserted += with_deadlock_retry(MAX_RETRIES, || apply_chunk(&pool, chunk))?;
        }
        Ok(inserted)
    })
    .await
    .context("bulk_insert(quests) task panicked")?
}

fn apply_chunk(pool: &MySqlPool, chunk: &[QuestRow]) -> Result<usize> {
    let mut conn = pool.get().context("checkout connection for quests insert")?;

    conn.transaction(|conn| -> Result<usize> {
        diesel::sql_query(
            "CREATE TEMPORARY TABLE IF NOT EXISTS tmp_qide (
                pokestop VARCHAR(50) NOT NULL,
                pokestop_name VARCHAR(255) NOT NULL,
                latitude DOUBLE NOT NULL,
                longitude DOUBLE NOT NULL,
                area_id SMALLINT UNSIGNED NOT NULL,
                seen_at DATETIME NOT NULL,
                day_date DATE NOT NULL,
                mode TINYINT UNSIGNED NOT NULL,
                task_type SMALLINT UNSIGNED NOT NULL,
                item_id SMALLINT UNSIGNED NOT NULL,
                item_amount SMALLINT UNSIGNED NOT NULL,
                INDEX ix_tmp_qide_p (pokestop)
            ) ENGINE=InnoDB",
        )
        .execute(conn)?;

        diesel::sql_query(
            "CREATE TEMPORARY TABLE IF NOT EXISTS tmp_qpde (
                pokestop VARCHAR(50) NOT NULL,
                pokestop_name VARCHAR(255) NOT NULL,
                latitude DOUBLE NOT NULL,
                longitude DOUBLE NOT NULL,
                area_id SMALLINT UNSIGNED NOT NULL,
                seen_at DATETIME NOT NULL,
                day_date DATE NOT NULL,
                mode TINYINT UNSIGNED NOT NULL,
                task_type SMALLINT UNSIGNED NOT NULL,
                poke_id SMALLINT UNSIGNED NOT NULL,
                poke_form VARCHAR(15) NOT NULL,
                INDEX ix_tmp_qpde_p (pokestop)
            ) ENGINE=InnoDB",
        )
        .execute(conn)?;

        let mut item_values = Vec::new();
        let mut pokemon_values = Vec::new();
        for r in chunk {
            let seen_at = DateTime::<Utc>::from_timestamp(r.first_seen, 0).unwrap_or_else(Utc::now);
            let seen_at_s = sql_escape_string(&seen_at.format("%Y-%m-%d %H:%M:%S").to_string());
            let day_date_s = sql_escape_string(&seen_at.format("%Y-%m-%d").to_string());
            let pokestop = sql_escape_string(&r.pokestop);
            let pokestop_name = sql_escape_string(&r.pokestop_name);

            if r.kind == 0 {
                item_values.push(format!(
                    "({pokestop}, {pokestop_name}, {}, {}, {}, {seen_at_s}, {day_date_s}, {}, {}, {}, {})",
                    r.latitude, r.longitude, r.area_id, r.mode, r.task_type, r.item_id, r.item_amount,
                ));
            } else {
                pokemon_values.push(format!(
                    "({pokestop}, {pokestop_name}, {}, {}, {}, {seen_at_s}, {day_date_s}, {}, {}, {}, {})",
                    r.latitude,
                    r.longitude,
                    r.area_id,
                    r.mode,
                    r.task_type,
                    r.poke_id,
                    sql_escape_string(&r.poke_form),
                ));
            }
        }

        if !item_values.is_empty() {
            diesel::sql_query(format!("INSERT INTO tmp_qide VALUES {}", item_values.join(","))).execute(conn)?;
        }
        if !pokemon_values.is_empty() {
            diesel::sql_query(format!("INSERT INTO tmp_qpde VALUES {}", pokemon_values.join(","))).execute(conn)?;
        }

        diesel::sql_query(
            "INSERT IGNORE INTO pokestops (pokestop, pokestop_name, latitude, longitude)
             SELECT pokestop, ANY_VALUE(pokestop_name), ANY_VALUE(latitude), ANY_VALUE(longitude)
             FROM (
                 SELECT pokestop, pokestop_name, latitude, longitude FROM tmp_qide
                 UNION ALL
                 SELECT pokestop, pokestop_name, latitude, longitude FROM tmp_qpde
             ) u
             GROUP BY pokestop",
        )
        .execute(conn)?;

        diesel::sql_query(
            "UPDATE pokestops p
             JOIN (
                 SELECT pokestop, ANY_VALUE(pokestop_name) AS pokestop_name,
                        ANY_VALUE(latitude) AS latitude, ANY_VALUE(longitude) AS longitude
                 FROM (
                     SELECT pokestop, pokestop_name, latitude, longitude FROM tmp_qide
                     UNION ALL
                     SELECT pokestop, pokestop_name, latitude, longitude FROM tmp_qpde
                 ) u
                 GROUP BY pokestop
             ) x ON x.pokestop = p.pokestop
             SET p.pokestop_name = x.pokestop_name, p.latitude = x.latitude, p.longitude = x.longitude
             WHERE p.pokestop_name <> x.pokestop_name OR p.latitude <> x.latitude OR p.longitude <> x.longitude",
        )
        .execute(conn)?;

        let mut inserted = 0usize;
        if !item_values.is_empty() {
            inserted += diesel::sql_query(
                "INSERT IGNORE INTO quests_item_daily_events (
                    pokestop, area_id, seen_at, day_date, mode, task_type, item_id, item_amount
                )
                SELECT pokestop, area_id, seen_at, day_date, mode, task_type, item_id, item_amount
                FROM tmp_qide",
            )
            .execute(conn)?;
        }
        if !pokemon_values.is_empty() {
            inserted += diesel::sql_query(
                "INSERT IGNORE INTO quests_pokemon_daily_events (
                    pokestop, area_id, seen_at, day_date, mode, task_type, poke_id, poke_form
                )
                SELECT pokestop, area_id, seen_at, day_date, mode, task_type, poke_id, poke_form
                FROM tmp_qpde",
            )
            .execute(conn)?;
        }

        diesel::sql_query("DROP TEMPORARY TABLE IF EXISTS tmp_qide").execute(conn)?;
        diesel::sql_query("DROP TEMPORARY TABLE IF EXISTS tmp_qpde").execute(conn)?;

        debug!(rows = chunk.len(), inserted, "applied quests chunk");
        Ok(inserted)
    })
}
