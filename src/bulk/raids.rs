use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diesel::RunQueryDsl;
use diesel::connection::Connection;
use tracing::debug;

use crate::buffers::raids::RaidRow;
use crate::relational_store::{MySqlPool, sql_escape_string, with_deadlock_retry};

use super::{CHUNK_SIZE, MAX_RETRIES};

pub async fn bulk_upsert(pool: MySqlPool, mut rows: Vec<RaidRow>) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    let total = rows.len();
    rows.sort_by(|a, b| a.gym.cmp(&b.gym));

    tokio::task::spawn_blocking(move || {
        for chunk in rows.chunks(CHUNK_SIZE) {
            with_deadlock_retry(MAX_RETRIES, || apply_chunk(&pool, chunk))?;
        }
        Ok(total)
    })
    .await
    .context("bulk_upsert(raids) task panicked")?
}

fn apply_chunk(pool: &MySqlPool, chunk: &[RaidRow]) -> Result<()> {
    let mut conn = pool.get().context("checkout connection for raids upsert")?;

    conn.transaction(|conn| -> Result<()> {
        diesel::sql_query(
            "CREATE TEMPORARY TABLE IF NOT EXISTS tmp_raids (
                gym VARCHAR(50) NOT NULL,
                gym_name VARCHAR(255) NOT NULL,
                latitude DOUBLE NOT NULL,
                longitude DOUBLE NOT NULL,
                raid_pokemon INT NOT NULL,
                raid_level INT NOT NULL,
                raid_form VARCHAR(15) NOT NULL,
                raid_team INT NOT NULL,
                raid_costume VARCHAR(15) NOT NULL,
                raid_is_exclusive TINYINT NOT NULL,
                raid_ex_raid_eligible TINYINT NOT NULL,
                area_id SMALLINT UNSIGNED NOT NULL,
                month_year SMALLINT UNSIGNED NOT NULL,
                day_date DATE NOT NULL,
                seen_at DATETIME NOT NULL,
                INDEX idx_tmp_raids_gym (gym),
                INDEX idx_tmp_raids_month (month_year)
            ) ENGINE=InnoDB",
        )
        .execute(conn)?;

        let values: Vec<String> = chunk
            .iter()
            .map(|r| {
                let seen_at = DateTime::<Utc>::from_timestamp(r.first_seen, 0).unwrap_or_else(Utc::now);
                format!(
                    "({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {})",
                    sql_escape_string(&r.gym),
                    sql_escape_string(&r.gym_name),
                    r.latitude,
                    r.longitude,
                    r.raid_pokemon,
                    r.raid_level,
                    sql_escape_string(&r.raid_form),
                    r.raid_team,
                    sql_escape_string(&r.raid_costume),
                    r.raid_is_exclusive,
                    r.raid_ex_raid_eligible,
                    r.area_id,
                    seen_at.format("%y%m"),
                    sql_escape_string(&seen_at.format("%Y-%m-%d").to_string()),
                    sql_escape_string(&seen_at.format("%Y-%m-%d %H:%M:%S").to_string()),
                )
            })
            .collect();
        diesel::sql_query(format!("INSERT INTO tmp_raids VALUES {}", values.join(","))).execute(conn)?;

        diesel::sql_query(
            "INSERT IGNORE INTO gyms (gym, gym_name, latitude, longitude)
             SELECT t.gym, ANY_VALUE(t.gym_name), ANY_VALUE(t.latitude), ANY_VALUE(t.longitude)
             FROM tmp_raids t
             GROUP BY t.gym",
        )
        .execute(conn)?;

        diesel::sql_query(
            "UPDATE gyms g
             JOIN (
                 SELECT t.gym, ANY_VALUE(t.gym_name) AS gym_name, ANY_VALUE(t.latitude) AS latitude, ANY_VALUE(t.longitude) AS longitude
                 FROM tmp_raids t
                 GROUP BY t.gym
             ) x ON x.gym = g.gym
             SET g.gym_name = x.gym_name, g.latitude = x.latitude, g.longitude = x.longitude
             WHERE g.gym_name <> x.gym_name OR g.latitude <> x.latitude OR g.longitude <> x.longitude",
        )
        .execute(conn)?;

        diesel::sql_query(
            "INSERT INTO aggregated_raids (
                gym, raid_pokemon, raid_level, raid_form, raid_team,
                raid_costume, raid_is_exclusive, raid_ex_raid_eligible, area_id, month_year, total_count
            )
            SELECT t.gym, t.raid_pokemon, t.raid_level, t.raid_form, t.raid_team,
                   t.raid_costume, t.raid_is_exclusive, t.raid_ex_raid_eligible, t.area_id, t.month_year, COUNT(*)
            FROM tmp_raids t
            GROUP BY t.gym, t.raid_pokemon, t.raid_level, t.raid_form, t.raid_team,
                     t.raid_costume, t.raid_is_exclusive, t.raid_ex_raid_eligible, t.area_id, t.month_year
            ON DUPLICATE KEY UPDATE total_count = total_count + VALUES(total_count)",
        )
        .execute(conn)?;

        diesel::sql_query(
            "INSERT IGNORE INTO raids_daily_events (
                day_date, gym, raid_pokemon, raid_level, raid_form, raid_team, area_id, seen_at
            )
            SELECT t.day_date, t.gym, t.raid_pokemon, t.raid_level, t.raid_form, t.raid_team, t.area_id, t.seen_at
            FROM tmp_raids t",
        )
        .execute(conn)?;

        diesel::sql_query("DROP TEMPORARY TABLE IF EXISTS tmp_raids").execute(conn)?;

        debug!(rows = chunk.len(), "applied raids chunk");
        Ok(())
    })
}
