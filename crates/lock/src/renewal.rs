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

//! The client-driven renewal loop shared by both lock flavors.

use std::time::Duration;

use async_trait::async_trait;
use tokio::{
    sync::{mpsc, watch},
    time::Instant,
};
use tracing::{debug, warn};

use crate::{
    LockConfig,
    handle::HandleState,
    metrics::{LOCK_FORCED_KILLS, LOCK_RELEASED, LOCK_RENEWAL_FAILURES},
};

/// Backoff before the single renewal retry.
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// How a flavor refreshes and disposes of its lease.
#[async_trait]
pub(crate) trait Renewer: Send + 'static {
    fn flavor(&self) -> &'static str;

    fn lock_name(&self) -> &str;

    /// One keep-alive round-trip. `false` on any failure.
    async fn renew(&mut self) -> bool;

    /// Revoke the lease. Failures are logged and swallowed — the lease
    /// expires on its own either way.
    async fn revoke(&mut self);
}

/// Drive renewals until release or liveness loss.
///
/// Every `renew_interval` a keep-alive goes out; a success arms the
/// watchdog for another `watchdog` period, a failure is retried once
/// after [`RETRY_BACKOFF`]. If the watchdog elapses without a successful
/// renewal the kill signal fires *before* the lease is revoked, so the
/// guarded command aborts as early as possible.
pub(crate) async fn renewal_loop<R: Renewer>(
    mut renewer: R,
    config: LockConfig,
    state_tx: watch::Sender<HandleState>,
    mut release_rx: mpsc::Receiver<()>,
) {
    let mut ticker =
        tokio::time::interval_at(Instant::now() + config.renew_interval(), config.renew_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let watchdog = tokio::time::sleep(config.watchdog());
    tokio::pin!(watchdog);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if renewer.renew().await {
                    watchdog.as_mut().reset(Instant::now() + config.watchdog());
                    continue;
                }
                LOCK_RENEWAL_FAILURES.with_label_values(&[renewer.flavor()]).inc();

                // One retry, racing the watchdog through the backoff.
                tokio::select! {
                    () = tokio::time::sleep(RETRY_BACKOFF) => {
                        if renewer.renew().await {
                            watchdog.as_mut().reset(Instant::now() + config.watchdog());
                        } else {
                            LOCK_RENEWAL_FAILURES.with_label_values(&[renewer.flavor()]).inc();
                        }
                    }
                    () = &mut watchdog => {
                        force_kill(&mut renewer, &state_tx).await;
                        return;
                    }
                    _ = release_rx.recv() => {
                        release(&mut renewer, &state_tx).await;
                        return;
                    }
                }
            }
            () = &mut watchdog => {
                force_kill(&mut renewer, &state_tx).await;
                return;
            }
            _ = release_rx.recv() => {
                release(&mut renewer, &state_tx).await;
                return;
            }
        }
    }
}

async fn force_kill<R: Renewer>(renewer: &mut R, state_tx: &watch::Sender<HandleState>) {
    warn!(lock = renewer.lock_name(), "renewal liveness lost, forcing kill");
    LOCK_FORCED_KILLS.with_label_values(&[renewer.flavor()]).inc();
    let _ = state_tx.send(HandleState::NeedsKill);
    renewer.revoke().await;
}

async fn release<R: Renewer>(renewer: &mut R, state_tx: &watch::Sender<HandleState>) {
    debug!(lock = renewer.lock_name(), "releasing lock");
    LOCK_RELEASED.with_label_values(&[renewer.flavor()]).inc();
    renewer.revoke().await;
    let _ = state_tx.send(HandleState::Released);
}
