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

//! Master-side registry of proxied locks.
//!
//! For every lock created through the HTTP endpoints the master owns the
//! coordinator lease, remembers the secret, and runs a watchdog: if no
//! valid renewal arrives within one TTL, the lease is revoked and a kill
//! marker is written for the guarded job so the worker running it
//! cancels. The marker rides the normal kill-prefix watch, so no extra
//! notification path exists for this case.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

use cronwheel_base::{KILL_MARKER_TTL_SECS, KeyLayout};
use cronwheel_coordinator::{CasOutcome, KvEngine, LeaseId, PutOptions};
use cronwheel_model::KillMarker;
use rand::{Rng, distributions::Alphanumeric};
use snafu::ResultExt;
use tokio::{
    sync::watch,
    time::{Instant, sleep_until},
};
use tracing::{debug, info, warn};

use crate::{
    LockConfig,
    error::{AlreadyHeldSnafu, CoordinatorSnafu, InvalidSecretSnafu, Result, UnknownLeaseSnafu},
    metrics::{FLAVOR_PROXY, LOCK_FORCED_KILLS},
};

const SECRET_LEN: usize = 24;

/// What the create endpoint hands back to the worker.
#[derive(Clone, Debug)]
pub struct LockGrant {
    pub name:     String,
    pub ttl_secs: u64,
    pub password: String,
    pub lease_id: LeaseId,
}

struct Registered {
    name:     String,
    secret:   String,
    ttl:      Duration,
    deadline: watch::Sender<Instant>,
}

/// In-memory registry of proxied locks, keyed by lease id.
pub struct LockRegistry {
    engine: Arc<dyn KvEngine>,
    layout: KeyLayout,
    config: LockConfig,
    locks:  Mutex<HashMap<LeaseId, Registered>>,
}

impl LockRegistry {
    #[must_use]
    pub fn new(engine: Arc<dyn KvEngine>, layout: KeyLayout, config: LockConfig) -> Arc<Self> {
        Arc::new(Self {
            engine,
            layout,
            config,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Acquire a lock on behalf of a worker.
    ///
    /// The returned password is the only credential for renewals; the
    /// worker must send it back at sub-TTL cadence or the watchdog kills
    /// the lock.
    pub async fn create(self: &Arc<Self>, name: &str, ttl_secs: Option<u64>) -> Result<LockGrant> {
        let ttl_secs = ttl_secs.filter(|ttl| *ttl > 0).unwrap_or(self.config.ttl_secs);
        let ttl = Duration::from_secs(ttl_secs);
        let secret: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SECRET_LEN)
            .map(char::from)
            .collect();

        let lease = self
            .engine
            .lease_grant(ttl)
            .await
            .context(CoordinatorSnafu { name })?;

        let key = self.layout.lock_key(name);
        let outcome = match self
            .engine
            .acquire(&key, secret.clone().into_bytes(), lease)
            .await
        {
            Ok(outcome) => outcome,
            Err(source) => {
                self.revoke_quietly(lease, name).await;
                return Err(source).context(CoordinatorSnafu { name });
            }
        };
        if let CasOutcome::Held { .. } = outcome {
            self.revoke_quietly(lease, name).await;
            return AlreadyHeldSnafu { name }.fail();
        }

        let (deadline_tx, deadline_rx) = watch::channel(Instant::now() + ttl);
        self.locks.lock().unwrap().insert(lease, Registered {
            name: name.to_string(),
            secret: secret.clone(),
            ttl,
            deadline: deadline_tx,
        });
        tokio::spawn(watchdog(
            Arc::downgrade(self),
            lease,
            name.to_string(),
            deadline_rx,
        ));

        info!(lock = name, lease, ttl_secs, "proxied lock created");
        Ok(LockGrant {
            name: name.to_string(),
            ttl_secs,
            password: secret,
            lease_id: lease,
        })
    }

    /// Forward one renewal to the coordinator after validating the
    /// secret.
    pub async fn renew(&self, lease: LeaseId, password: &str) -> Result<()> {
        let (name, ttl) = {
            let locks = self.locks.lock().unwrap();
            let Some(registered) = locks.get(&lease) else {
                return UnknownLeaseSnafu { lease }.fail();
            };
            if registered.secret != password {
                return InvalidSecretSnafu {
                    name: registered.name.clone(),
                }
                .fail();
            }
            (registered.name.clone(), registered.ttl)
        };

        self.engine
            .lease_keep_alive_once(lease)
            .await
            .context(CoordinatorSnafu { name: name.as_str() })?;

        if let Some(registered) = self.locks.lock().unwrap().get(&lease) {
            let _ = registered.deadline.send(Instant::now() + ttl);
        }
        Ok(())
    }

    /// Voluntary release: revoke the lease and retire the watchdog.
    pub async fn release(&self, lease: LeaseId) -> Result<()> {
        let Some(registered) = self.locks.lock().unwrap().remove(&lease) else {
            return UnknownLeaseSnafu { lease }.fail();
        };
        // Dropping the deadline sender wakes the watchdog task up so it
        // can exit.
        let name = registered.name.clone();
        drop(registered);
        self.revoke_quietly(lease, &name).await;
        debug!(lock = %name, lease, "proxied lock released");
        Ok(())
    }

    /// Number of currently registered locks. Test and monitoring helper.
    #[must_use]
    pub fn len(&self) -> usize { self.locks.lock().unwrap().len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.locks.lock().unwrap().is_empty() }

    async fn revoke_quietly(&self, lease: LeaseId, name: &str) {
        if let Err(error) = self.engine.lease_revoke(lease).await {
            warn!(lock = name, lease, %error, "lease revoke failed, letting it expire");
        }
    }

    async fn expire(&self, lease: LeaseId, name: &str) {
        if self.locks.lock().unwrap().remove(&lease).is_none() {
            return;
        }
        warn!(lock = name, lease, "proxied lock renewal liveness lost, forcing kill");
        LOCK_FORCED_KILLS.with_label_values(&[FLAVOR_PROXY]).inc();
        self.revoke_quietly(lease, name).await;

        // Tell whichever worker runs the guarded job to cancel. Job locks
        // are named jobs/<category>/<id>; anything else has no execution
        // to kill.
        let jobs_prefix = "jobs/";
        if let Some((category, id)) = name
            .strip_prefix(jobs_prefix)
            .and_then(|tail| tail.split_once('/'))
            .and_then(|(category, id)| id.parse::<i64>().ok().map(|id| (category, id)))
        {
            let marker = KillMarker {
                category: category.to_string(),
                job_id:   id,
            };
            let result = async {
                let marker_lease = self
                    .engine
                    .lease_grant(Duration::from_secs(KILL_MARKER_TTL_SECS))
                    .await?;
                self.engine
                    .put(
                        &self.layout.kill_key(category, id),
                        serde_json::to_vec(&marker).expect("kill marker serializes"),
                        PutOptions {
                            lease: Some(marker_lease),
                            prev_kv: false,
                        },
                    )
                    .await?;
                Ok::<_, cronwheel_coordinator::Error>(())
            }
            .await;
            if let Err(error) = result {
                warn!(lock = name, %error, "failed to write kill marker after lease loss");
            }
        }
    }
}

async fn watchdog(
    registry: Weak<LockRegistry>,
    lease: LeaseId,
    name: String,
    mut deadline_rx: watch::Receiver<Instant>,
) {
    loop {
        let deadline = *deadline_rx.borrow();
        tokio::select! {
            () = sleep_until(deadline) => {
                if *deadline_rx.borrow() <= Instant::now() {
                    let Some(registry) = registry.upgrade() else { return };
                    registry.expire(lease, &name).await;
                    return;
                }
                // Deadline moved while sleeping; go around.
            }
            changed = deadline_rx.changed() => {
                if changed.is_err() {
                    // Released; nothing to watch anymore.
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use cronwheel_coordinator::{MemEngine, RangeOptions};

    use super::*;
    use crate::Error;

    fn setup() -> (Arc<LockRegistry>, MemEngine, KeyLayout) {
        let engine = MemEngine::new();
        let layout = KeyLayout::default();
        let registry = LockRegistry::new(
            Arc::new(engine.clone()),
            layout.clone(),
            LockConfig::default(),
        );
        (registry, engine, layout)
    }

    #[tokio::test]
    async fn create_then_duplicate_is_already_held() {
        let (registry, _engine, _layout) = setup();
        let grant = registry.create("jobs/default/7", None).await.unwrap();
        assert!(!grant.password.is_empty());

        let err = registry.create("jobs/default/7", None).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyHeld { .. }));
    }

    #[tokio::test]
    async fn renew_validates_the_secret() {
        let (registry, _engine, _layout) = setup();
        let grant = registry.create("jobs/default/7", None).await.unwrap();

        registry.renew(grant.lease_id, &grant.password).await.unwrap();

        let err = registry.renew(grant.lease_id, "wrong").await.unwrap_err();
        assert!(matches!(err, Error::InvalidSecret { .. }));

        let err = registry.renew(9999, &grant.password).await.unwrap_err();
        assert!(matches!(err, Error::UnknownLease { .. }));
    }

    #[tokio::test]
    async fn release_revokes_and_frees_the_name() {
        let (registry, engine, layout) = setup();
        let grant = registry.create("jobs/default/7", None).await.unwrap();

        registry.release(grant.lease_id).await.unwrap();
        assert!(registry.is_empty());

        let key = layout.lock_key("jobs/default/7");
        let range = engine.range(&key, RangeOptions::default()).await.unwrap();
        assert!(range.kvs.is_empty());

        registry.create("jobs/default/7", None).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_expiry_revokes_and_writes_a_kill_marker() {
        let (registry, engine, layout) = setup();
        let grant = registry.create("jobs/default/7", None).await.unwrap();

        // No renewals arrive; the watchdog horizon is the full TTL.
        tokio::time::advance(Duration::from_secs(11)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(registry.is_empty());
        let lock_key = layout.lock_key("jobs/default/7");
        assert!(engine.range(&lock_key, RangeOptions::default()).await.unwrap().kvs.is_empty());

        let marker_key = layout.kill_key("default", 7);
        let markers = engine.range(&marker_key, RangeOptions::default()).await.unwrap();
        assert_eq!(markers.kvs.len(), 1);
        let marker: KillMarker = serde_json::from_slice(&markers.kvs[0].value).unwrap();
        assert_eq!(marker, KillMarker {
            category: "default".to_string(),
            job_id:   7,
        });
        drop(grant);
    }

    #[tokio::test(start_paused = true)]
    async fn renewals_hold_the_watchdog_off() {
        let (registry, _engine, _layout) = setup();
        let grant = registry.create("jobs/default/7", None).await.unwrap();

        for _ in 0..6 {
            tokio::time::advance(Duration::from_secs(5)).await;
            registry.renew(grant.lease_id, &grant.password).await.unwrap();
        }
        assert_eq!(registry.len(), 1);
    }
}
