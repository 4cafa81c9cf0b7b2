//! MySQL connection pool plus the small set of transaction helpers every
//! bulk processor shares (isolation level, lock-wait-timeout, deadlock
//! retry).

use anyhow::{Context, Result};
use diesel::Connection;
use diesel::mysql::MysqlConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use std::time::Duration;
use tracing::warn;

pub type MySqlPool = Pool<ConnectionManager<MysqlConnection>>;

pub fn build_pool(database_url: &str, max_size: u32) -> Result<MySqlPool> {
    let manager = ConnectionManager::<MysqlConnection>::new(database_url);
    Pool::builder()
        .max_size(max_size)
        .build(manager)
        .context("failed to build MySQL connection pool")
}

pub fn run_pending_migrations(pool: &MySqlPool) -> Result<()> {
    use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    let mut conn = pool.get().context("failed to check out connection for migrations")?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("failed to run pending migrations: {e}"))?;
    Ok(())
}

/// Attempts `op` up to `attempts` times, backing off on MySQL deadlock
/// (error 1213) and lock-wait-timeout (error 1205) — the two error classes
/// bulk upserts into heavily-contended aggregate tables actually hit.
pub fn with_deadlock_retry<T, F>(attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut last_err = None;
    for attempt in 0..attempts {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if is_retryable_mysql_error(&e) => {
                let backoff = Duration::from_millis(50 * 2u64.pow(attempt.min(6)));
                warn!(attempt, error = %e, backoff_ms = backoff.as_millis(), "retrying after deadlock/lock-timeout");
                std::thread::sleep(backoff);
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("retry loop exited without an attempt")))
}

fn is_retryable_mysql_error(err: &anyhow::Error) -> bool {
    let msg = err.to_string();
    msg.contains("1213") || msg.contains("Deadlock") || msg.contains("1205") || msg.contains("Lock wait timeout")
}

/// Escapes a string for safe inlining into a bulk multi-row `VALUES`
/// clause. diesel's MySQL backend has no portable way to bind a
/// variable-width row count in one query, so bulk upserts build the
/// `VALUES` list directly; every non-numeric field goes through this.
pub fn sql_escape_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => escaped.push_str("''"),
            '\\' => escaped.push_str("\\\\"),
            _ => escaped.push(ch),
        }
    }
    escaped.push('\'');
    escaped
}
