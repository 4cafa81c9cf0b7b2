//! Single-writer leadership over the staging store's partition/refresher
//! work, so a multi-process deployment doesn't race itself on DDL or
//! external API calls.
//!
//! Acquisition is `SET key value NX PX ttl`; holding the lock is a
//! heartbeat task that renews the TTL at `ttl/3`; release is a
//! compare-and-delete Lua script so a process can never clear a lock it
//! doesn't actually hold (e.g. after a renewal race with a newly-elected
//! leader).

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::staging_store::StagingStore;

const LOCK_KEY: &str = "psyduckv2:leader:lock";

pub struct LeaderElection {
    store: StagingStore,
    holder_id: String,
    ttl: Duration,
    is_leader: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl LeaderElection {
    pub fn new(store: StagingStore, ttl: Duration) -> Self {
        Self {
            store,
            holder_id: Uuid::new_v4().to_string(),
            ttl,
            is_leader: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::Relaxed)
    }

    /// A cheap, clonable handle for reporting leader/follower status from
    /// places (like the webhook's `/healthz`) that shouldn't hold the full
    /// `LeaderElection` (and its `StagingStore`/heartbeat state) themselves.
    pub fn status_handle(&self) -> LeaderStatus {
        LeaderStatus(self.is_leader.clone())
    }

    /// Spawns the acquire/renew loop. `on_first_acquire` runs exactly once,
    /// the first time this process becomes leader — used to drive the
    /// stale-staging-key reconciliation pass before regular flusher loops
    /// start.
    pub fn spawn<F, Fut>(&self, on_first_acquire: F) -> CancellationToken
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let store = self.store.clone();
        let holder_id = self.holder_id.clone();
        let ttl = self.ttl;
        let is_leader = self.is_leader.clone();
        let cancel = self.cancel.clone();
        let mut on_first_acquire = Some(on_first_acquire);

        let task_cancel = cancel.clone();
        tokio::spawn(
            async move {
                let renew_interval = ttl / 3;
                loop {
                    if task_cancel.is_cancelled() {
                        break;
                    }

                    if !is_leader.load(Ordering::Relaxed) {
                        match store.set_nx_px(LOCK_KEY, &holder_id, ttl.as_millis() as u64).await {
                            Ok(true) => {
                                is_leader.store(true, Ordering::Relaxed);
                                metrics::gauge!("leader.is_leader").set(1.0);
                                metrics::counter!("leader.acquired").increment(1);
                                info!("acquired leadership");
                                if let Some(f) = on_first_acquire.take() {
                                    f().await;
                                }
                            }
                            Ok(false) => {}
                            Err(e) => warn!(error = %e, "leader acquisition attempt failed"),
                        }
                    } else {
                        match store.renew_if_holder(LOCK_KEY, &holder_id, ttl.as_millis() as u64).await {
                            Ok(true) => {}
                            Ok(false) => {
                                is_leader.store(false, Ordering::Relaxed);
                                metrics::gauge!("leader.is_leader").set(0.0);
                                metrics::counter!("leader.lost").increment(1);
                                warn!("lost leadership (lock no longer ours)");
                            }
                            Err(e) => warn!(error = %e, "leadership renewal failed, will retry"),
                        }
                    }

                    tokio::select! {
                        _ = tokio::time::sleep(renew_interval) => {}
                        _ = task_cancel.cancelled() => break,
                    }
                }

                if is_leader.load(Ordering::Relaxed) {
                    let _ = store.delete_if_holder(LOCK_KEY, &holder_id).await;
                }
            }
            .instrument(info_span!("leader_election")),
        );

        cancel
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[derive(Clone)]
pub struct LeaderStatus(Arc<AtomicBool>);

impl LeaderStatus {
    pub fn is_leader(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
