use anyhow::{Context, Result, bail};
use chrono::{Datelike, Duration as ChronoDuration, Utc};
use diesel::RunQueryDsl;
use diesel::sql_types::Text;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};

use crate::relational_store::MySqlPool;

use super::{Grain, MANAGED_TABLES, PartitionRow, PartitionedTable};

const PMAX: &str = "pMAX";

/// Runs the ensurer once across every managed table. Individual table
/// failures are logged and skipped; they do not abort the others.
pub async fn ensure_all(pool: MySqlPool, days_back: i64, days_forward: i64) -> Result<()> {
    for t in MANAGED_TABLES {
        let pool = pool.clone();
        let t = t.clone();
        let result =
            tokio::task::spawn_blocking(move || ensure_table(&pool, &t, days_back, days_forward))
                .await
                .context("ensure_table task panicked")?;
        if let Err(e) = result {
            error!(table = t.table, error = %e, "partition ensurer failed for table");
        }
    }
    Ok(())
}

fn ensure_table(pool: &MySqlPool, t: &PartitionedTable, days_back: i64, days_forward: i64) -> Result<()> {
    let mut conn = pool.get().context("checkout connection for partition ensure")?;

    let existing: Vec<PartitionRow> = diesel::sql_query(
        "SELECT partition_name, partition_description
         FROM information_schema.partitions
         WHERE table_schema = DATABASE() AND table_name = ? AND partition_name IS NOT NULL",
    )
    .bind::<Text, _>(t.table)
    .load(&mut conn)
    .with_context(|| format!("reading partitions for {}", t.table))?;

    if existing.is_empty() {
        bail!("table {} is not partitioned (no rows in information_schema.partitions)", t.table);
    }
    if !existing.iter().any(|p| p.partition_name == PMAX) {
        bail!("table {} has no pMAX catch-all partition; refusing to reorganize", t.table);
    }

    let targets = match t.grain {
        Grain::Daily => daily_targets(days_back, days_forward),
        Grain::Monthly => monthly_targets(),
    };

    let have: std::collections::HashSet<String> = existing.into_iter().map(|p| p.partition_name).collect();

    for (name, upper_bound_sql) in targets {
        if have.contains(&name) {
            continue;
        }
        let sql = format!(
            "ALTER TABLE {table} REORGANIZE PARTITION {pmax} INTO (
                PARTITION {name} VALUES LESS THAN ({upper_bound_sql}),
                PARTITION {pmax} VALUES LESS THAN (MAXVALUE)
            )",
            table = t.table,
            pmax = PMAX,
        );
        diesel::sql_query(sql).execute(&mut conn).with_context(|| format!("adding partition {name} to {}", t.table))?;
        info!(table = t.table, partition = name, "added partition");
    }

    Ok(())
}

/// `(partition_name, upper_bound_sql_literal)` pairs for `[today -
/// days_back, today + days_forward]`, in ascending upper-bound order so
/// `pMAX` splits correctly each iteration.
fn daily_targets(days_back: i64, days_forward: i64) -> Vec<(String, String)> {
    let today = Utc::now().date_naive();
    let start = today - ChronoDuration::days(days_back);
    let end = today + ChronoDuration::days(days_forward);

    let mut out = Vec::new();
    let mut day = start;
    while day <= end {
        let upper = day.succ_opt().unwrap_or(day);
        out.push((format!("p{}", day.format("%Y%m%d")), format!("'{}'", upper.format("%Y-%m-%d"))));
        day = day.succ_opt().unwrap_or(day);
    }
    out
}

/// Monthly targets span the same `(today - days_back, today + days_forward)`
/// window expressed in whole months, matching spec's "same structure" note.
fn monthly_targets() -> Vec<(String, String)> {
    let today = Utc::now().date_naive();
    let mut out = Vec::new();
    for offset in -1..=2i32 {
        let (year, month) = add_months(today.year(), today.month() as i32, offset);
        let (next_year, next_month) = add_months(year, month, 1);
        let yymm = format!("{:02}{:02}", year % 100, month);
        let next_yymm: i32 = format!("{:02}{:02}", next_year % 100, next_month).parse().unwrap_or(9999);
        out.push((format!("p{yymm}"), next_yymm.to_string()));
    }
    out
}

fn add_months(year: i32, month: i32, offset: i32) -> (i32, i32) {
    let zero_based = month - 1 + offset;
    let year = year + zero_based.div_euclid(12);
    let month = zero_based.rem_euclid(12) + 1;
    (year, month)
}

pub fn spawn_ensure_loop(pool: MySqlPool, interval: std::time::Duration, days_back: i64, days_forward: i64, cancel: CancellationToken) {
    tokio::spawn(
        async move {
            let jitter = rand::rng().random_range(0..5_000);
            tokio::time::sleep(std::time::Duration::from_millis(jitter)).await;

            loop {
                if let Err(e) = ensure_all(pool.clone(), days_back, days_forward).await {
                    warn!("partition ensure cycle failed: {e:#}");
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = cancel.cancelled() => {
                        info!("partition ensurer stopping");
                        return;
                    }
                }
            }
        }
        .instrument(tracing::info_span!("partition_ensurer")),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_targets_span_the_requested_window() {
        let targets = daily_targets(1, 1);
        assert_eq!(targets.len(), 3);
        assert!(targets[0].0.starts_with('p'));
        assert!(targets[1].1.starts_with('\''));
    }

    #[test]
    fn add_months_rolls_over_year_boundary() {
        assert_eq!(add_months(2025, 12, 1), (2026, 1));
        assert_eq!(add_months(2025, 1, -1), (2024, 12));
    }

    #[test]
    fn monthly_targets_are_four_consecutive_months() {
        let targets = monthly_targets();
        assert_eq!(targets.len(), 4);
        for (name, _) in &targets {
            assert!(name.starts_with('p'));
            assert_eq!(name.len(), 5);
        }
    }
}
