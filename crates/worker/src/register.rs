// Copyright 2025 Cronwheel Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Ephemeral worker registration.
//!
//! One key under the workers prefix, attached to a lease renewed at a
//! third of its TTL. The entry therefore disappears within one TTL of
//! the worker's death; a lost lease is re-granted and the key
//! re-published, so a coordinator hiccup does not unregister a live
//! worker for good.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use cronwheel_base::KeyLayout;
use cronwheel_coordinator::{KvEngine, LeaseId, PutOptions};
use cronwheel_model::WorkerMeta;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;

/// A live registration; deregister on shutdown.
pub struct Registration {
    stop: CancellationToken,
    join: JoinHandle<()>,
}

impl Registration {
    /// Publish the registration and start its keep-alive loop.
    pub async fn start(
        engine: Arc<dyn KvEngine>,
        layout: KeyLayout,
        name: &str,
        ttl: Duration,
    ) -> Result<Self> {
        let meta = WorkerMeta {
            name:       name.to_string(),
            host:       hostname::get()
                .map(|host| host.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string()),
            pid:        std::process::id(),
            started_at: Utc::now(),
        };
        let key = layout.worker_key(name);
        let lease = publish(&*engine, &key, &meta, ttl).await?;
        info!(worker = name, lease, "registered");

        let stop = CancellationToken::new();
        let join = tokio::spawn(keep_alive(
            engine,
            key,
            meta,
            ttl,
            lease,
            stop.clone(),
        ));
        Ok(Self { stop, join })
    }

    /// Revoke the lease (removing the key) and stop the loop.
    pub async fn deregister(self) {
        self.stop.cancel();
        let _ = self.join.await;
    }
}

async fn publish(
    engine: &dyn KvEngine,
    key: &str,
    meta: &WorkerMeta,
    ttl: Duration,
) -> Result<LeaseId> {
    let lease = engine.lease_grant(ttl).await?;
    engine
        .put(
            key,
            serde_json::to_vec(meta).expect("worker meta serializes"),
            PutOptions {
                lease:   Some(lease),
                prev_kv: false,
            },
        )
        .await?;
    Ok(lease)
}

async fn keep_alive(
    engine: Arc<dyn KvEngine>,
    key: String,
    meta: WorkerMeta,
    ttl: Duration,
    mut lease: LeaseId,
    stop: CancellationToken,
) {
    let mut ticker = tokio::time::interval(ttl / 3);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            _ = ticker.tick() => {
                match engine.lease_keep_alive_once(lease).await {
                    Ok(_) => {}
                    Err(error) => {
                        warn!(worker = %meta.name, %error, "registration keep-alive failed");
                        // The lease may be gone entirely; re-publish
                        // under a fresh one.
                        match publish(&*engine, &key, &meta, ttl).await {
                            Ok(fresh) => {
                                debug!(worker = %meta.name, lease = fresh, "re-registered");
                                lease = fresh;
                            }
                            Err(error) => {
                                warn!(worker = %meta.name, %error, "re-registration failed");
                            }
                        }
                    }
                }
            }
        }
    }

    if let Err(error) = engine.lease_revoke(lease).await {
        warn!(worker = %meta.name, %error, "deregistration revoke failed, lease will expire");
    } else {
        info!(worker = %meta.name, "deregistered");
    }
}

#[cfg(test)]
mod tests {
    use cronwheel_coordinator::{MemEngine, RangeOptions};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn registration_persists_while_renewed_and_vanishes_on_deregister() {
        let engine = MemEngine::new();
        let layout = KeyLayout::default();
        let registration = Registration::start(
            Arc::new(engine.clone()),
            layout.clone(),
            "w1",
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        // Far past the TTL: renewals keep the key alive.
        tokio::time::sleep(Duration::from_secs(60)).await;
        let range = engine
            .range(&layout.worker_key("w1"), RangeOptions::default())
            .await
            .unwrap();
        assert_eq!(range.kvs.len(), 1);
        let meta: WorkerMeta = serde_json::from_slice(&range.kvs[0].value).unwrap();
        assert_eq!(meta.name, "w1");

        registration.deregister().await;
        let range = engine
            .range(&layout.worker_key("w1"), RangeOptions::default())
            .await
            .unwrap();
        assert!(range.kvs.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn lost_leases_are_regranted() {
        let engine = MemEngine::new();
        let layout = KeyLayout::default();
        let registration = Registration::start(
            Arc::new(engine.clone()),
            layout.clone(),
            "w2",
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        // Simulate a semantic failure: somebody revoked the lease.
        let range = engine
            .range(&layout.worker_key("w2"), RangeOptions::default())
            .await
            .unwrap();
        engine.lease_revoke(range.kvs[0].lease).await.unwrap();

        // The next keep-alive notices and re-publishes.
        tokio::time::sleep(Duration::from_secs(8)).await;
        let range = engine
            .range(&layout.worker_key("w2"), RangeOptions::default())
            .await
            .unwrap();
        assert_eq!(range.kvs.len(), 1);

        registration.deregister().await;
    }
}
