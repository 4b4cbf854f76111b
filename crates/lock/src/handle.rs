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

use cronwheel_coordinator::LeaseId;
use tokio::sync::{mpsc, watch};

/// Observable state of a held lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleState {
    /// The lock is held and renewing.
    Held,
    /// Renewal liveness was lost; the guarded work must abort now.
    NeedsKill,
    /// The holder released the lock voluntarily. Observers exit, nothing
    /// to abort.
    Released,
}

/// A held distributed lock.
///
/// Renewal runs in a background task tied to the handle. Dropping the
/// handle releases the lock too (the renewal task notices the closed
/// channel and revokes), but [`release`](Self::release) is the explicit
/// path: it returns only after the revocation has been attempted.
#[derive(Debug)]
pub struct LockHandle {
    name:       String,
    lease:      LeaseId,
    secret:     String,
    state:      watch::Receiver<HandleState>,
    release_tx: mpsc::Sender<()>,
}

impl LockHandle {
    pub(crate) fn new(
        name: String,
        lease: LeaseId,
        secret: String,
        state: watch::Receiver<HandleState>,
        release_tx: mpsc::Sender<()>,
    ) -> Self {
        Self {
            name,
            lease,
            secret,
            state,
            release_tx,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    #[must_use]
    pub fn lease_id(&self) -> LeaseId { self.lease }

    #[must_use]
    pub fn secret(&self) -> &str { &self.secret }

    /// The one-shot signal the guarded code path observes.
    #[must_use]
    pub fn kill_signal(&self) -> KillSignal {
        KillSignal {
            rx: self.state.clone(),
        }
    }

    /// Release the lock: the lease is revoked (which atomically deletes
    /// the key) and every kill-signal observer resolves with
    /// [`HandleState::Released`]. Returns once the revocation has been
    /// attempted.
    pub async fn release(mut self) {
        let _ = self.release_tx.send(()).await;
        while *self.state.borrow() == HandleState::Held {
            if self.state.changed().await.is_err() {
                break;
            }
        }
    }
}

/// Waits for the lock to leave the `Held` state.
#[derive(Clone)]
pub struct KillSignal {
    rx: watch::Receiver<HandleState>,
}

impl KillSignal {
    /// Resolve to the terminal state. A dropped renewal task counts as a
    /// release: there is nothing left that could revoke the work.
    pub async fn wait(mut self) -> HandleState {
        loop {
            let state = *self.rx.borrow();
            if state != HandleState::Held {
                return state;
            }
            if self.rx.changed().await.is_err() {
                return HandleState::Released;
            }
        }
    }

    #[must_use]
    pub fn current(&self) -> HandleState { *self.rx.borrow() }
}
