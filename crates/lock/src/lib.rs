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

//! Distributed lock engine.
//!
//! A lock is a coordinator key `<locks-prefix>/<name>` holding a secret,
//! attached to a lease. It exists iff the lock is held, and it only ever
//! disappears through lease revocation or expiry — never a bare delete,
//! which could clobber a successor that re-created the key under a new
//! lease.
//!
//! One interface, two flavors, selected at construction:
//!
//! - [`CasLockManager`] — the worker owns the lease and drives renewal
//!   against the coordinator directly
//! - [`ProxyLockManager`] — the master owns the lease; the worker
//!   acquires and renews through the master's lock HTTP endpoints, and
//!   [`LockRegistry`] on the master side validates secrets and runs the
//!   per-lock watchdog
//!
//! Every held lock exposes a [`KillSignal`]. It resolves to
//! [`HandleState::NeedsKill`] when renewal liveness is lost and the
//! guarded work must abort, or to [`HandleState::Released`] on a normal
//! release so observers always wake up exactly once.

mod cas;
mod config;
mod error;
mod handle;
mod metrics;
mod proxy;
mod registry;
mod renewal;

pub use cas::CasLockManager;
pub use config::LockConfig;
pub use error::{Error, Result};
pub use handle::{HandleState, KillSignal, LockHandle};
pub use proxy::{LockCreated, LockOpStatus, ProxyLockManager};
pub use registry::{LockGrant, LockRegistry};

use async_trait::async_trait;

/// Acquisition seam shared by both flavors.
///
/// Acquisition either returns a held handle or fails with
/// [`Error::AlreadyHeld`]; contention is reported, never retried here —
/// the caller decides.
#[async_trait]
pub trait LockManager: Send + Sync {
    async fn try_acquire(&self, name: &str) -> Result<LockHandle>;
}
