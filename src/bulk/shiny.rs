use anyhow::{Context, Result};
use diesel::RunQueryDsl;
use diesel::connection::Connection;
use tracing::debug;

use crate::buffers::shiny::ShinyRow;
use crate::relational_store::{MySqlPool, sql_escape_string, with_deadlock_retry};

use super::{CHUNK_SIZE, MAX_RETRIES};

pub async fn bulk_upsert(pool: MySqlPool, mut rows: Vec<ShinyRow>) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    let total = rows.len();
    rows.sort_by(|a, b| a.username.cmp(&b.username));

    tokio::task::spawn_blocking(move || {
        for chunk in rows.chunks(CHUNK_SIZE) {
            with_deadlock_retry(MAX_RETRIES, || apply_chunk(&pool, chunk))?;
        }
        Ok(total)
    })
    .await
    .context("bulk_upsert(shiny) task panicked")?
}

fn apply_chunk(pool: &MySqlPool, chunk: &[ShinyRow]) -> Result<()> {
    let mut conn = pool.get().context("checkout connection for shiny upsert")?;

    conn.transaction(|conn| -> Result<()> {
        diesel::sql_query(
            "CREATE TEMPORARY TABLE IF NOT EXISTS tmp_shiny (
                username VARCHAR(255) NOT NULL,
                pokemon_id INT NOT NULL,
                form VARCHAR(15) NOT NULL,
                shiny TINYINT UNSIGNED NOT NULL,
                area_id SMALLINT UNSIGNED NOT NULL,
                month_year SMALLINT UNSIGNED NOT NULL,
                inc INT NOT NULL,
                INDEX idx_tmp_shiny_user (username)
            ) ENGINE=InnoDB",
        )
        .execute(conn)?;

        let values: Vec<String> = chunk
            .iter()
            .map(|r| {
                format!(
                    "({}, {}, {}, {}, {}, {}, {})",
                    sql_escape_string(&r.username),
                    r.pokemon_id,
                    sql_escape_string(&r.form),
                    r.shiny,
                    r.area_id,
                    r.month_year.parse::<u16>().unwrap_or(0),
                    r.count,
                )
            })
            .collect();
        diesel::sql_query(format!("INSERT INTO tmp_shiny VALUES {}", values.join(","))).execute(conn)?;

        diesel::sql_query(
            "INSERT INTO shiny_username_rates (
                username, pokemon_id, form, shiny, area_id, month_year, total_count
            )
            SELECT t.username, t.pokemon_id, t.form, t.shiny, t.area_id, t.month_year, SUM(t.inc)
            FROM tmp_shiny t
            GROUP BY t.username, t.pokemon_id, t.form, t.shiny, t.area_id, t.month_year
            ON DUPLICATE KEY UPDATE total_count = total_count + VALUES(total_count)",
        )
        .execute(conn)?;

        diesel::sql_query("DROP TEMPORARY TABLE IF EXISTS tmp_shiny").execute(conn)?;

        debug!(rows = chunk.len(), "applied shiny chunk");
        Ok(())
    })
}
