//! Local cache in front of values the leader publishes to the staging
//! store: geofences, pokestop counts, and the configured timezone.
//!
//! The Python original kept a second "legacy global state" mirror purely so
//! readers had something to fall back to when Redis was briefly
//! unreachable. Instead of replicating that second storage location, each
//! cache entry here carries its own `fetched_at` and a `stale_allowed` flag:
//! staleness is a property of the entry, not a separate code path.

use anyhow::Result;
use moka::future::Cache;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::staging_store::StagingStore;

const GEOFENCES_KEY: &str = "koji_geofences";
const POKESTOPS_KEY: &str = "cached_pokestops";
const TIMEZONE_KEY: &str = "psyduckv2:state:user_timezone";

/// A cached value plus enough bookkeeping to decide whether serving it
/// stale (rather than blocking on a store round-trip) is acceptable.
#[derive(Clone)]
struct Entry<T> {
    value: T,
    fetched_at: Instant,
}

#[derive(Clone)]
pub struct SharedState {
    store: StagingStore,
    geofences: Cache<(), Entry<serde_json::Value>>,
    pokestops: Cache<(), Entry<serde_json::Value>>,
    timezone: Cache<(), Entry<String>>,
    /// Entries older than this are still served, but callers are told the
    /// read was stale so they can emit a metric / log a warning.
    stale_after: Duration,
}

pub struct Read<T> {
    pub value: T,
    pub stale: bool,
}

impl SharedState {
    pub fn new(store: StagingStore, local_ttl: Duration, stale_after: Duration) -> Self {
        // moka's own TTL must never evict an entry before `stale_after` would
        // already flag it as stale — otherwise a staging-store outage past
        // `local_ttl` drops the last-known value instead of falling back to
        // it. Evict at whichever window is longer.
        let cache_ttl = local_ttl.max(stale_after);
        let builder = || Cache::builder().max_capacity(1).time_to_live(cache_ttl).build();
        Self {
            store,
            geofences: builder(),
            pokestops: builder(),
            timezone: builder(),
            stale_after,
        }
    }

    pub async fn get_geofences(&self) -> Result<Option<Read<serde_json::Value>>> {
        self.get(&self.geofences, GEOFENCES_KEY).await
    }

    pub async fn set_geofences(&self, geofences: serde_json::Value) -> Result<()> {
        self.set(&self.geofences, GEOFENCES_KEY, geofences).await
    }

    pub async fn get_pokestops(&self) -> Result<Option<Read<serde_json::Value>>> {
        self.get(&self.pokestops, POKESTOPS_KEY).await
    }

    pub async fn set_pokestops(&self, pokestops: serde_json::Value) -> Result<()> {
        self.set(&self.pokestops, POKESTOPS_KEY, pokestops).await
    }

    pub async fn get_timezone(&self) -> Result<Option<Read<String>>> {
        let cached = self.timezone.get(&()).await;
        if let Some(entry) = cached {
            return Ok(Some(self.to_read(entry)));
        }
        let raw: Option<String> = self.store.get_string(TIMEZONE_KEY).await?;
        match raw {
            Some(value) => {
                let entry = Entry {
                    value: value.clone(),
                    fetched_at: Instant::now(),
                };
                self.timezone.insert((), entry).await;
                Ok(Some(Read { value, stale: false }))
            }
            None => Ok(None),
        }
    }

    pub async fn set_timezone(&self, tz: &str) -> Result<()> {
        self.store.set_string(TIMEZONE_KEY, tz, None).await?;
        self.timezone
            .insert(
                (),
                Entry {
                    value: tz.to_string(),
                    fetched_at: Instant::now(),
                },
            )
            .await;
        Ok(())
    }

    /// Blocks (polling every 500ms) until geofences have been published by
    /// the leader, or `timeout` elapses.
    pub async fn wait_for_state(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.get_geofences().await {
                return true;
            }
            sleep(Duration::from_millis(500)).await;
        }
        warn!(timeout_s = timeout.as_secs(), "timed out waiting for leader-published state");
        false
    }

    async fn get(&self, cache: &Cache<(), Entry<serde_json::Value>>, key: &str) -> Result<Option<Read<serde_json::Value>>> {
        if let Some(entry) = cache.get(&()).await {
            return Ok(Some(self.to_read(entry)));
        }
        let raw = self.store.get_string(key).await?;
        match raw {
            Some(raw) => {
                let value: serde_json::Value = serde_json::from_str(&raw)?;
                let entry = Entry {
                    value: value.clone(),
                    fetched_at: Instant::now(),
                };
                cache.insert((), entry).await;
                Ok(Some(Read { value, stale: false }))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, cache: &Cache<(), Entry<serde_json::Value>>, key: &str, value: serde_json::Value) -> Result<()> {
        let serialized = serde_json::to_string(&value)?;
        self.store.set_string(key, &serialized, None).await?;
        cache
            .insert(
                (),
                Entry {
                    value,
                    fetched_at: Instant::now(),
                },
            )
            .await;
        Ok(())
    }

    fn to_read<T: Clone>(&self, entry: Entry<T>) -> Read<T> {
        let stale = entry.fetched_at.elapsed() > self.stale_after;
        if stale {
            metrics::counter!("shared_state.stale_read").increment(1);
            debug!(age_s = entry.fetched_at.elapsed().as_secs(), "serving stale cached state");
        }
        Read {
            value: entry.value,
            stale,
        }
    }

}
