use anyhow::{Context, Result};
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Utc};
use diesel::RunQueryDsl;
use diesel::sql_types::Text;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};

use crate::config::RetentionConfig;
use crate::relational_store::MySqlPool;

use super::{Grain, MANAGED_TABLES, PartitionRow, PartitionedTable};

const PMAX: &str = "pMAX";

/// Retention settings per managed table, looked up by table name. Built
/// from [`crate::config::AppConfig`] at startup; `quests_item_daily_events`
/// and `quests_pokemon_daily_events` share the same quests retention, and
/// there is no monthly table for quests (it has no aggregate path).
pub struct CleanRetention {
    pub pokemon_iv: RetentionConfig,
    pub raids: RetentionConfig,
    pub quests: RetentionConfig,
    pub invasions: RetentionConfig,
    pub shiny: RetentionConfig,
}

impl CleanRetention {
    fn for_table(&self, table: &str) -> &RetentionConfig {
        match table {
            "pokemon_iv_daily_events" | "aggregated_pokemon_iv_monthly" => &self.pokemon_iv,
            "raids_daily_events" | "aggregated_raids" => &self.raids,
            "quests_item_daily_events" | "quests_pokemon_daily_events" => &self.quests,
            "invasions_daily_events" | "aggregated_invasions" => &self.invasions,
            "shiny_username_rates" => &self.shiny,
            other => unreachable!("unmanaged table {other}"),
        }
    }
}

/// Runs the cleaner once across every managed table. Individual table
/// failures are logged and skipped; they do not abort the others.
pub async fn clean_all(pool: MySqlPool, retention: &CleanRetention, dry_run: bool) -> Result<()> {
    for t in MANAGED_TABLES {
        let keep = retention.for_table(t.table);
        let skip_reason = match t.grain {
            Grain::Daily if keep.keep_days <= 0 => Some("keep_days <= 0"),
            Grain::Monthly if keep.keep_months <= 0 => Some("keep_months <= 0"),
            _ => None,
        };
        if let Some(reason) = skip_reason {
            info!(table = t.table, reason, "partition cleaner skipping table, retention disabled");
            continue;
        }

        let pool = pool.clone();
        let t = t.clone();
        let keep = keep.clone();
        let result =
            tokio::task::spawn_blocking(move || clean_table(&pool, &t, &keep, dry_run))
                .await
                .context("clean_table task panicked")?;
        if let Err(e) = result {
            error!(table = t.table, error = %e, "partition cleaner failed for table");
        }
    }
    Ok(())
}

fn clean_table(pool: &MySqlPool, t: &PartitionedTable, keep: &RetentionConfig, dry_run: bool) -> Result<()> {
    let mut conn = pool.get().context("checkout connection for partition clean")?;

    let existing: Vec<PartitionRow> = diesel::sql_query(
        "SELECT partition_name, partition_description
         FROM information_schema.partitions
         WHERE table_schema = DATABASE() AND table_name = ? AND partition_name IS NOT NULL",
    )
    .bind::<Text, _>(t.table)
    .load(&mut conn)
    .with_context(|| format!("reading partitions for {}", t.table))?;

    let to_drop: Vec<String> = match t.grain {
        Grain::Daily => daily_drops(&existing, keep.keep_days),
        Grain::Monthly => monthly_drops(&existing, keep.keep_months),
    };

    if to_drop.is_empty() {
        return Ok(());
    }

    if dry_run {
        info!(table = t.table, partitions = ?to_drop, "dry run: would drop partitions");
        return Ok(());
    }

    let sql = format!("ALTER TABLE {} DROP PARTITION {}", t.table, to_drop.join(", "));
    diesel::sql_query(sql).execute(&mut conn).with_context(|| format!("dropping partitions on {}", t.table))?;
    info!(table = t.table, partitions = ?to_drop, "dropped partitions");

    Ok(())
}

/// Partitions are named `pYYYYMMDD` for the day they hold; a partition's
/// upper bound is the following day. Drop when that upper bound is at or
/// before `keep_from`, i.e. when the held day is strictly before it.
fn daily_drops(existing: &[PartitionRow], keep_days: i64) -> Vec<String> {
    let keep_from = Utc::now().date_naive() - ChronoDuration::days(keep_days - 1);
    existing
        .iter()
        .filter(|p| p.partition_name != PMAX)
        .filter_map(|p| parse_daily_partition(&p.partition_name).map(|day| (p.partition_name.clone(), day)))
        .filter(|(_, day)| *day < keep_from)
        .map(|(name, _)| name)
        .collect()
}

fn parse_daily_partition(name: &str) -> Option<NaiveDate> {
    let digits = name.strip_prefix('p')?;
    NaiveDate::parse_from_str(digits, "%Y%m%d").ok()
}

fn monthly_drops(existing: &[PartitionRow], keep_months: i64) -> Vec<String> {
    let today = Utc::now().date_naive();
    let first_of_month = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
    let keep_from = sub_months(first_of_month, keep_months - 1);
    let cutoff_yymm = (keep_from.year() % 100) * 100 + keep_from.month() as i32;

    existing
        .iter()
        .filter(|p| p.partition_name != PMAX)
        .filter_map(|p| parse_monthly_partition(&p.partition_name).map(|yymm| (p.partition_name.clone(), yymm)))
        .filter(|(_, yymm)| *yymm < cutoff_yymm)
        .map(|(name, _)| name)
        .collect()
}

fn parse_monthly_partition(name: &str) -> Option<i32> {
    let digits = name.strip_prefix('p')?;
    if digits.len() != 4 {
        return None;
    }
    digits.parse().ok()
}

fn sub_months(date: NaiveDate, months: i64) -> NaiveDate {
    let total = date.year() as i64 * 12 + (date.month() as i64 - 1) - months;
    let year = total.div_euclid(12) as i32;
    let month = (total.rem_euclid(12) + 1) as u32;
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

pub fn spawn_clean_loop(pool: MySqlPool, interval: std::time::Duration, retention: CleanRetention, dry_run: bool, cancel: CancellationToken) {
    tokio::spawn(
        async move {
            let jitter = rand::rng().random_range(0..10_000);
            tokio::time::sleep(std::time::Duration::from_millis(jitter)).await;

            loop {
                if let Err(e) = clean_all(pool.clone(), &retention, dry_run).await {
                    warn!("partition clean cycle failed: {e:#}");
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = cancel.cancelled() => {
                        info!("partition cleaner stopping");
                        return;
                    }
                }
            }
        }
        .instrument(tracing::info_span!("partition_cleaner")),
    );
}
