//! Staging buffers: in-store accumulation of events (hash increments for
//! the aggregated families, list appends for the raw-event families) plus
//! the drain protocol shared by all of them.
//!
//! Draining always follows the same three steps: rename the live key to a
//! `:flushing`/`:force_flushing` suffix (atomic, so concurrent writers keep
//! hitting the original key), read everything out of the renamed key, then
//! delete the renamed key in a `finally`-equivalent regardless of how
//! parsing went. A rename that fails with "no such key" means another
//! drain raced us to an empty buffer — that's success, not an error.

pub mod invasions;
pub mod pokemon_iv;
pub mod quests;
pub mod raids;
pub mod shiny;

use anyhow::Result;
use tracing::debug;

use crate::staging_store::StagingStore;

/// Suffix applied to the staging key while a drain is in flight. `force`
/// distinguishes an operator/shutdown-triggered flush from the regular
/// threshold-triggered one, so operators can tell them apart in logs.
pub fn flushing_suffix(force: bool) -> &'static str {
    if force { ":force_flushing" } else { ":flushing" }
}

/// Drains a hash-shaped buffer: rename, read, always delete. Returns
/// `None` if there was nothing to drain.
pub async fn drain_hash(store: &StagingStore, key: &str, force: bool) -> Result<Option<Vec<(String, String)>>> {
    let staging_key = format!("{key}{}", flushing_suffix(force));
    if !store.rename_if_exists(key, &staging_key).await? {
        debug!(key, "nothing to drain");
        return Ok(None);
    }
    let result = store.hgetall(&staging_key).await;
    store.del(&staging_key).await.ok();
    let rows = result?;
    if rows.is_empty() {
        Ok(None)
    } else {
        Ok(Some(rows))
    }
}

/// Drains a list-shaped buffer the same way as [`drain_hash`].
pub async fn drain_list(store: &StagingStore, key: &str, force: bool) -> Result<Option<Vec<String>>> {
    let staging_key = format!("{key}{}", flushing_suffix(force));
    if !store.rename_if_exists(key, &staging_key).await? {
        debug!(key, "nothing to drain");
        return Ok(None);
    }
    let result = store.lrange_all(&staging_key).await;
    store.del(&staging_key).await.ok();
    let rows = result?;
    if rows.is_empty() {
        Ok(None)
    } else {
        Ok(Some(rows))
    }
}

/// Reads and deletes both possible stale-drain suffixes of `key` directly,
/// without the rename step (the data is already sitting under the renamed
/// name). A crashed leader can leave one of these behind mid-drain; a newly
/// elected leader reconciles them once before starting its own flush loops.
pub async fn recover_stale_hash(store: &StagingStore, key: &str) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for suffix in [":flushing", ":force_flushing"] {
        let stale_key = format!("{key}{suffix}");
        if store.exists(&stale_key).await.unwrap_or(false) {
            out.extend(store.hgetall(&stale_key).await?);
            store.del(&stale_key).await.ok();
        }
    }
    Ok(out)
}

/// List-shaped counterpart to [`recover_stale_hash`].
pub async fn recover_stale_list(store: &StagingStore, key: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for suffix in [":flushing", ":force_flushing"] {
        let stale_key = format!("{key}{suffix}");
        if store.exists(&stale_key).await.unwrap_or(false) {
            out.extend(store.lrange_all(&stale_key).await?);
            store.del(&stale_key).await.ok();
        }
    }
    Ok(out)
}
