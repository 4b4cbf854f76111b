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

//! In-process lock flavor: the worker owns the lease.

use std::sync::Arc;

use async_trait::async_trait;
use cronwheel_base::KeyLayout;
use cronwheel_coordinator::{CasOutcome, KvEngine, LeaseId};
use rand::{Rng, distributions::Alphanumeric};
use snafu::ResultExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::{
    LockConfig, LockManager,
    error::{AlreadyHeldSnafu, CoordinatorSnafu, Result},
    handle::{HandleState, LockHandle},
    metrics::{FLAVOR_CAS, LOCK_ACQUIRED, LOCK_CONTENDED},
    renewal::{Renewer, renewal_loop},
};

const SECRET_LEN: usize = 24;

fn random_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LEN)
        .map(char::from)
        .collect()
}

/// Lock manager that acquires through the coordinator's CAS transaction
/// and renews the lease from this process.
#[derive(Clone)]
pub struct CasLockManager {
    engine: Arc<dyn KvEngine>,
    layout: KeyLayout,
    config: LockConfig,
}

impl CasLockManager {
    #[must_use]
    pub fn new(engine: Arc<dyn KvEngine>, layout: KeyLayout, config: LockConfig) -> Self {
        Self {
            engine,
            layout,
            config,
        }
    }
}

#[async_trait]
impl LockManager for CasLockManager {
    async fn try_acquire(&self, name: &str) -> Result<LockHandle> {
        let key = self.layout.lock_key(name);
        let secret = random_secret();

        // The lease exists before the key does; on any acquisition
        // failure it is revoked right away instead of lingering until
        // TTL.
        let lease = self
            .engine
            .lease_grant(self.config.ttl())
            .await
            .context(CoordinatorSnafu { name })?;

        let outcome = match self
            .engine
            .acquire(&key, secret.clone().into_bytes(), lease)
            .await
        {
            Ok(outcome) => outcome,
            Err(source) => {
                revoke_quietly(&*self.engine, lease, name).await;
                return Err(source).context(CoordinatorSnafu { name });
            }
        };

        match outcome {
            CasOutcome::Acquired => {
                debug!(lock = name, lease, "lock acquired");
                LOCK_ACQUIRED.with_label_values(&[FLAVOR_CAS]).inc();
            }
            CasOutcome::Held { .. } => {
                LOCK_CONTENDED.with_label_values(&[FLAVOR_CAS]).inc();
                revoke_quietly(&*self.engine, lease, name).await;
                return AlreadyHeldSnafu { name }.fail();
            }
        }

        let (state_tx, state_rx) = watch::channel(HandleState::Held);
        let (release_tx, release_rx) = mpsc::channel(1);
        tokio::spawn(renewal_loop(
            LeaseRenewer {
                engine: self.engine.clone(),
                lease,
                name: name.to_string(),
            },
            self.config,
            state_tx,
            release_rx,
        ));

        Ok(LockHandle::new(
            name.to_string(),
            lease,
            secret,
            state_rx,
            release_tx,
        ))
    }
}

async fn revoke_quietly(engine: &dyn KvEngine, lease: LeaseId, name: &str) {
    if let Err(error) = engine.lease_revoke(lease).await {
        warn!(lock = name, lease, %error, "lease revoke failed, letting it expire");
    }
}

struct LeaseRenewer {
    engine: Arc<dyn KvEngine>,
    lease:  LeaseId,
    name:   String,
}

#[async_trait]
impl Renewer for LeaseRenewer {
    fn flavor(&self) -> &'static str { FLAVOR_CAS }

    fn lock_name(&self) -> &str { &self.name }

    async fn renew(&mut self) -> bool {
        match self.engine.lease_keep_alive_once(self.lease).await {
            Ok(_) => true,
            Err(error) => {
                warn!(lock = %self.name, lease = self.lease, %error, "lock renewal failed");
                false
            }
        }
    }

    async fn revoke(&mut self) { revoke_quietly(&*self.engine, self.lease, &self.name).await; }
}
