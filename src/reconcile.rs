//! Leader-reconciliation pass (`SPEC_FULL.md` Design Notes, Open Question
//! #3): on first leader acquisition — not on lease renewal — scan every
//! buffer for a stale `:flushing`/`:force_flushing` key a crashed former
//! leader left mid-drain, and apply whatever rows are in it through the
//! matching bulk processor before the regular flusher loops start.
//!
//! A normal `force_flush` cannot recover these on its own: draining renames
//! the live key to the staging suffix first, so a leftover staging key from
//! a previous crash is simply never looked at again once a fresh leader
//! starts its own drain cycle against the live key.

use tracing::{info, warn};

use crate::buffers::{invasions, pokemon_iv, quests, raids, shiny};
use crate::bulk;
use crate::relational_store::MySqlPool;
use crate::staging_store::StagingStore;

pub async fn reconcile_stale_buffers(store: &StagingStore, pool: &MySqlPool) {
    reconcile_one("pokemon_iv", pokemon_iv::recover_stale(store).await, |rows| {
        bulk::pokemon_iv::bulk_upsert(pool.clone(), rows)
    })
    .await;
    reconcile_one("shiny", shiny::recover_stale(store).await, |rows| bulk::shiny::bulk_upsert(pool.clone(), rows)).await;
    reconcile_one("raids", raids::recover_stale(store).await, |rows| bulk::raids::bulk_upsert(pool.clone(), rows)).await;
    reconcile_one("quests", quests::recover_stale(store).await, |rows| bulk::quests::bulk_insert(pool.clone(), rows))
        .await;
    reconcile_one("invasions", invasions::recover_stale(store).await, |rows| {
        bulk::invasions::bulk_upsert(pool.clone(), rows)
    })
    .await;
}

async fn reconcile_one<Row, F, Fut>(name: &str, recovered: anyhow::Result<Vec<Row>>, apply: F)
where
    F: FnOnce(Vec<Row>) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<usize>>,
{
    match recovered {
        Ok(rows) if rows.is_empty() => {}
        Ok(rows) => {
            let n = rows.len();
            match apply(rows).await {
                Ok(applied) => info!(buffer = name, recovered = n, applied, "reconciled stale buffer on leader acquisition"),
                Err(e) => warn!(buffer = name, recovered = n, error = %e, "failed to apply recovered stale buffer rows"),
            }
        }
        Err(e) => warn!(buffer = name, error = %e, "failed to scan for stale buffer rows"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_recovery_applies_nothing() {
        let mut applied = false;
        reconcile_one::<i32, _, _>("test", Ok(Vec::new()), |_rows| {
            applied = true;
            async { Ok(0) }
        })
        .await;
        assert!(!applied);
    }
}
