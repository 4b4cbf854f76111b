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

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    Result,
    types::{
        CasOutcome, CreateRevisionOrder, KeyValue, LeaseId, PutOptions, RangeOptions, RangeResult,
        WatchEvent,
    },
};

/// Typed operations over the coordinator.
///
/// Object-safe so callers hold `Arc<dyn KvEngine>` and tests substitute
/// the in-memory engine. Implementations are internally synchronized;
/// a shared engine can be used from any number of tasks.
#[async_trait]
pub trait KvEngine: Send + Sync {
    /// Write a key. Returns the previous pair when
    /// [`PutOptions::prev_kv`] is set and the key existed.
    async fn put(&self, key: &str, value: Vec<u8>, opts: PutOptions) -> Result<Option<KeyValue>>;

    /// Read a key or prefix.
    async fn range(&self, key: &str, opts: RangeOptions) -> Result<RangeResult>;

    /// Delete a key. Returns the previous pair when `prev_kv` is set and
    /// the key existed.
    async fn delete(&self, key: &str, prev_kv: bool) -> Result<Option<KeyValue>>;

    /// Watch a prefix from `start_revision` (inclusive). Events arrive in
    /// revision order; `prev_kv` attaches the overwritten pair to each
    /// event.
    async fn watch(&self, prefix: &str, start_revision: i64, prev_kv: bool) -> Result<Watch>;

    /// Grant a lease. Keys attached to it are deleted when it expires or
    /// is revoked.
    async fn lease_grant(&self, ttl: Duration) -> Result<LeaseId>;

    /// Emit a single keep-alive. Returns the remaining TTL;
    /// [`Error::LeaseNotFound`](crate::Error::LeaseNotFound) when the
    /// lease is gone.
    async fn lease_keep_alive_once(&self, lease: LeaseId) -> Result<Duration>;

    /// Revoke a lease, atomically deleting every key attached to it.
    async fn lease_revoke(&self, lease: LeaseId) -> Result<()>;

    /// The lock-acquisition transaction: *if* the key's creation revision
    /// is zero (absent) *then* put it with `value` and `lease`, *else*
    /// read the current holder.
    async fn acquire(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<CasOutcome>;
}

/// An open watch. Batches preserve coordinator revision order.
///
/// `recv` yields `None` when the watch ends; a transport failure is
/// delivered as a final `Some(Err(_))` before the stream closes.
pub struct Watch {
    rx: mpsc::UnboundedReceiver<Result<Vec<WatchEvent>>>,
}

impl Watch {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Result<Vec<WatchEvent>>>) -> Self { Self { rx } }

    pub async fn recv(&mut self) -> Option<Result<Vec<WatchEvent>>> { self.rx.recv().await }
}

/// Page through a prefix with stable positions under concurrent PUTs.
///
/// Two-phase scan anchored on creation revisions: a keys-only ascending
/// scan of `(page - 1) * page_size` keys locates the boundary key's
/// creation revision, then a second scan starts at that revision with
/// `limit = page_size + 1` and drops the boundary row. Creation revisions
/// are monotonic and immutable per key, so later PUTs (which get larger
/// revisions) cannot shift earlier pages. Concurrent DELETEs may still
/// hide a row; under coordinator compaction the anchor is best-effort.
pub async fn list_page(
    engine: &dyn KvEngine,
    prefix: &str,
    page: usize,
    page_size: usize,
) -> Result<Vec<KeyValue>> {
    if page_size == 0 {
        return Ok(Vec::new());
    }
    let skip = page.saturating_sub(1) * page_size;

    if skip == 0 {
        let result = engine
            .range(prefix, RangeOptions {
                prefix: true,
                sort: Some(CreateRevisionOrder::Ascending),
                limit: Some(page_size),
                ..RangeOptions::default()
            })
            .await?;
        return Ok(result.kvs);
    }

    let boundary = engine
        .range(prefix, RangeOptions {
            prefix: true,
            keys_only: true,
            sort: Some(CreateRevisionOrder::Ascending),
            limit: Some(skip),
            ..RangeOptions::default()
        })
        .await?;
    if boundary.kvs.len() < skip {
        // Fewer keys than the preceding pages hold; this page is empty.
        return Ok(Vec::new());
    }
    let Some(last) = boundary.kvs.last() else {
        return Ok(Vec::new());
    };

    let rows = engine
        .range(prefix, RangeOptions {
            prefix: true,
            sort: Some(CreateRevisionOrder::Ascending),
            limit: Some(page_size + 1),
            min_create_revision: Some(last.create_revision),
            ..RangeOptions::default()
        })
        .await?;

    let boundary_key = last.key.clone();
    Ok(rows
        .kvs
        .into_iter()
        .filter(|kv| kv.key != boundary_key)
        .take(page_size)
        .collect())
}
