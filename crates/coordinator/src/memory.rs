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

//! In-memory coordinator engine.
//!
//! A complete stand-in for the etcd backend: one monotonically
//! increasing store revision, immutable per-key creation revisions,
//! leases with deadlines and attached keys, watch replay from any start
//! revision, and the CAS acquisition transaction. Lease expiry is driven
//! by a background sweeper on the tokio clock, so tests running under
//! `start_paused` control expiry deterministically.
//!
//! The event history is unbounded and never compacted; this engine
//! exists for tests and local development, not production state.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::mpsc, time::Instant};

use crate::{
    Result,
    engine::{KvEngine, Watch},
    error::LeaseNotFoundSnafu,
    types::{
        CasOutcome, CreateRevisionOrder, KeyValue, LeaseId, PutOptions, RangeOptions, RangeResult,
        WatchEvent, WatchEventKind,
    },
};

const SWEEP_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone)]
struct Entry {
    value:           Vec<u8>,
    create_revision: i64,
    mod_revision:    i64,
    lease:           LeaseId,
}

struct LeaseState {
    ttl:      Duration,
    deadline: Instant,
    keys:     HashSet<String>,
}

struct Watcher {
    prefix:  String,
    prev_kv: bool,
    tx:      mpsc::UnboundedSender<Result<Vec<WatchEvent>>>,
}

#[derive(Default)]
struct State {
    revision:   i64,
    keys:       BTreeMap<String, Entry>,
    leases:     HashMap<LeaseId, LeaseState>,
    next_lease: LeaseId,
    watchers:   Vec<Watcher>,
    history:    Vec<WatchEvent>,
}

impl State {
    fn bump(&mut self) -> i64 {
        self.revision += 1;
        self.revision
    }

    fn kv(&self, key: &str, entry: &Entry) -> KeyValue {
        KeyValue {
            key:             key.to_string(),
            value:           entry.value.clone(),
            create_revision: entry.create_revision,
            mod_revision:    entry.mod_revision,
            lease:           entry.lease,
        }
    }

    fn detach(&mut self, key: &str, lease: LeaseId) {
        if lease != 0
            && let Some(state) = self.leases.get_mut(&lease)
        {
            state.keys.remove(key);
        }
    }

    fn put_entry(&mut self, key: &str, value: Vec<u8>, lease: LeaseId) -> Option<KeyValue> {
        let revision = self.bump();
        let prev = self.keys.get(key).cloned();
        if let Some(old) = &prev
            && old.lease != lease
        {
            self.detach(key, old.lease);
        }

        let entry = Entry {
            value,
            create_revision: prev.as_ref().map_or(revision, |old| old.create_revision),
            mod_revision: revision,
            lease,
        };
        let kv = self.kv(key, &entry);
        self.keys.insert(key.to_string(), entry);
        if lease != 0
            && let Some(state) = self.leases.get_mut(&lease)
        {
            state.keys.insert(key.to_string());
        }

        let prev_kv = prev.map(|entry| self.kv(key, &entry));
        self.emit(WatchEvent {
            kind: WatchEventKind::Put,
            kv,
            prev: prev_kv.clone(),
        });
        prev_kv
    }

    fn delete_entry(&mut self, key: &str) -> Option<KeyValue> {
        let entry = self.keys.remove(key)?;
        let revision = self.bump();
        self.detach(key, entry.lease);

        let prev = self.kv(key, &entry);
        self.emit(WatchEvent {
            kind: WatchEventKind::Delete,
            kv:   KeyValue {
                key:             key.to_string(),
                value:           Vec::new(),
                create_revision: 0,
                mod_revision:    revision,
                lease:           0,
            },
            prev: Some(prev.clone()),
        });
        Some(prev)
    }

    fn emit(&mut self, event: WatchEvent) {
        self.history.push(event.clone());
        self.watchers.retain(|watcher| {
            if !event.kv.key.starts_with(&watcher.prefix) {
                return !watcher.tx.is_closed();
            }
            let mut event = event.clone();
            if !watcher.prev_kv {
                event.prev = None;
            }
            watcher.tx.send(Ok(vec![event])).is_ok()
        });
    }

    fn revoke(&mut self, lease: LeaseId) -> bool {
        let Some(state) = self.leases.remove(&lease) else {
            return false;
        };
        for key in state.keys {
            self.delete_entry(&key);
        }
        true
    }
}

/// The in-memory engine. Cloning shares the underlying store.
#[derive(Clone)]
pub struct MemEngine {
    state: Arc<Mutex<State>>,
}

impl Default for MemEngine {
    fn default() -> Self { Self::new() }
}

impl MemEngine {
    /// Create an empty engine and start its lease sweeper.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        let state = Arc::new(Mutex::new(State::default()));
        tokio::spawn(sweep_leases(Arc::downgrade(&state)));
        Self { state }
    }

    /// The current store revision.
    #[must_use]
    pub fn revision(&self) -> i64 { self.state.lock().unwrap().revision }

    /// Whether a lease is currently live. Test helper.
    #[must_use]
    pub fn lease_exists(&self, lease: LeaseId) -> bool {
        self.state.lock().unwrap().leases.contains_key(&lease)
    }
}

async fn sweep_leases(state: Weak<Mutex<State>>) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let Some(state) = state.upgrade() else {
            return;
        };
        let now = Instant::now();
        let mut state = state.lock().unwrap();
        let expired: Vec<LeaseId> = state
            .leases
            .iter()
            .filter(|(_, lease)| lease.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for lease in expired {
            state.revoke(lease);
        }
    }
}

#[async_trait]
impl KvEngine for MemEngine {
    async fn put(&self, key: &str, value: Vec<u8>, opts: PutOptions) -> Result<Option<KeyValue>> {
        let mut state = self.state.lock().unwrap();
        if let Some(lease) = opts.lease
            && lease != 0
            && !state.leases.contains_key(&lease)
        {
            return LeaseNotFoundSnafu { lease }.fail();
        }
        let prev = state.put_entry(key, value, opts.lease.unwrap_or(0));
        Ok(if opts.prev_kv { prev } else { None })
    }

    async fn range(&self, key: &str, opts: RangeOptions) -> Result<RangeResult> {
        let state = self.state.lock().unwrap();
        let mut kvs: Vec<KeyValue> = state
            .keys
            .iter()
            .filter(|(candidate, _)| {
                if opts.prefix {
                    candidate.starts_with(key)
                } else {
                    candidate.as_str() == key
                }
            })
            .map(|(candidate, entry)| state.kv(candidate, entry))
            .filter(|kv| {
                opts.min_create_revision
                    .is_none_or(|min| kv.create_revision >= min)
            })
            .collect();

        match opts.sort {
            Some(CreateRevisionOrder::Ascending) => {
                kvs.sort_by_key(|kv| kv.create_revision);
            }
            Some(CreateRevisionOrder::Descending) => {
                kvs.sort_by_key(|kv| std::cmp::Reverse(kv.create_revision));
            }
            None => {}
        }
        if let Some(limit) = opts.limit {
            kvs.truncate(limit);
        }
        if opts.keys_only {
            for kv in &mut kvs {
                kv.value.clear();
            }
        }
        Ok(RangeResult {
            revision: state.revision,
            kvs,
        })
    }

    async fn delete(&self, key: &str, prev_kv: bool) -> Result<Option<KeyValue>> {
        let mut state = self.state.lock().unwrap();
        let prev = state.delete_entry(key);
        Ok(if prev_kv { prev } else { None })
    }

    async fn watch(&self, prefix: &str, start_revision: i64, prev_kv: bool) -> Result<Watch> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().unwrap();

        let backlog: Vec<WatchEvent> = state
            .history
            .iter()
            .filter(|event| {
                event.kv.mod_revision >= start_revision && event.kv.key.starts_with(prefix)
            })
            .cloned()
            .map(|mut event| {
                if !prev_kv {
                    event.prev = None;
                }
                event
            })
            .collect();
        if !backlog.is_empty() {
            let _ = tx.send(Ok(backlog));
        }

        state.watchers.push(Watcher {
            prefix: prefix.to_string(),
            prev_kv,
            tx,
        });
        Ok(Watch::new(rx))
    }

    async fn lease_grant(&self, ttl: Duration) -> Result<LeaseId> {
        let mut state = self.state.lock().unwrap();
        state.next_lease += 1;
        let lease = state.next_lease;
        state.leases.insert(lease, LeaseState {
            ttl,
            deadline: Instant::now() + ttl,
            keys: HashSet::new(),
        });
        Ok(lease)
    }

    async fn lease_keep_alive_once(&self, lease: LeaseId) -> Result<Duration> {
        let mut state = self.state.lock().unwrap();
        let Some(lease_state) = state.leases.get_mut(&lease) else {
            return LeaseNotFoundSnafu { lease }.fail();
        };
        lease_state.deadline = Instant::now() + lease_state.ttl;
        Ok(lease_state.ttl)
    }

    async fn lease_revoke(&self, lease: LeaseId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.revoke(lease) {
            Ok(())
        } else {
            LeaseNotFoundSnafu { lease }.fail()
        }
    }

    async fn acquire(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<CasOutcome> {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.keys.get(key) {
            let current = state.kv(key, entry);
            return Ok(CasOutcome::Held {
                current: Some(current),
            });
        }
        if !state.leases.contains_key(&lease) {
            return LeaseNotFoundSnafu { lease }.fail();
        }
        state.put_entry(key, value, lease);
        Ok(CasOutcome::Acquired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(text: &str) -> Vec<u8> { text.as_bytes().to_vec() }

    #[tokio::test]
    async fn create_revision_is_immutable_across_overwrites() {
        let engine = MemEngine::new();
        engine
            .put("/a", bytes("1"), PutOptions::default())
            .await
            .unwrap();
        engine
            .put("/a", bytes("2"), PutOptions::default())
            .await
            .unwrap();

        let result = engine.range("/a", RangeOptions::default()).await.unwrap();
        assert_eq!(result.kvs.len(), 1);
        assert_eq!(result.kvs[0].create_revision, 1);
        assert_eq!(result.kvs[0].mod_revision, 2);
        assert_eq!(result.revision, 2);
    }

    #[tokio::test]
    async fn put_returns_previous_pair_when_asked() {
        let engine = MemEngine::new();
        engine
            .put("/a", bytes("old"), PutOptions::default())
            .await
            .unwrap();
        let prev = engine
            .put("/a", bytes("new"), PutOptions {
                prev_kv: true,
                ..PutOptions::default()
            })
            .await
            .unwrap();
        assert_eq!(prev.unwrap().value, bytes("old"));
    }

    #[tokio::test]
    async fn watch_replays_from_start_revision_then_streams() {
        let engine = MemEngine::new();
        engine
            .put("/jobs/a", bytes("1"), PutOptions::default())
            .await
            .unwrap();
        let snapshot = engine
            .range("/jobs/", RangeOptions::prefix())
            .await
            .unwrap();

        let mut watch = engine
            .watch("/jobs/", snapshot.revision + 1, true)
            .await
            .unwrap();

        engine
            .put("/jobs/b", bytes("2"), PutOptions::default())
            .await
            .unwrap();
        engine.delete("/jobs/a", false).await.unwrap();

        let batch = watch.recv().await.unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].kind, WatchEventKind::Put);
        assert_eq!(batch[0].kv.key, "/jobs/b");

        let batch = watch.recv().await.unwrap().unwrap();
        assert_eq!(batch[0].kind, WatchEventKind::Delete);
        assert_eq!(batch[0].kv.key, "/jobs/a");
        assert_eq!(batch[0].prev.as_ref().unwrap().value, bytes("1"));
    }

    #[tokio::test]
    async fn cas_admits_exactly_one_acquirer() {
        let engine = MemEngine::new();
        let lease_a = engine.lease_grant(Duration::from_secs(10)).await.unwrap();
        let lease_b = engine.lease_grant(Duration::from_secs(10)).await.unwrap();

        let first = engine
            .acquire("/lock/k", bytes("secret-a"), lease_a)
            .await
            .unwrap();
        assert_eq!(first, CasOutcome::Acquired);

        let second = engine
            .acquire("/lock/k", bytes("secret-b"), lease_b)
            .await
            .unwrap();
        match second {
            CasOutcome::Held { current } => {
                assert_eq!(current.unwrap().value, bytes("secret-a"));
            }
            CasOutcome::Acquired => panic!("second acquire must not succeed"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn lease_expiry_deletes_attached_keys() {
        let engine = MemEngine::new();
        let lease = engine.lease_grant(Duration::from_secs(5)).await.unwrap();
        engine
            .put("/lock/k", bytes("s"), PutOptions {
                lease: Some(lease),
                ..PutOptions::default()
            })
            .await
            .unwrap();

        let mut watch = engine.watch("/lock/", 1, false).await.unwrap();
        // Consume the replayed put.
        let _ = watch.recv().await.unwrap().unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;

        let batch = watch.recv().await.unwrap().unwrap();
        assert_eq!(batch[0].kind, WatchEventKind::Delete);
        assert!(!engine.lease_exists(lease));
        let range = engine.range("/lock/k", RangeOptions::default()).await.unwrap();
        assert!(range.kvs.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn keep_alive_extends_the_deadline() {
        let engine = MemEngine::new();
        let lease = engine.lease_grant(Duration::from_secs(5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        engine.lease_keep_alive_once(lease).await.unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(engine.lease_exists(lease));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!engine.lease_exists(lease));
        assert!(engine.lease_keep_alive_once(lease).await.is_err());
    }

    #[tokio::test]
    async fn revoke_deletes_keys_and_is_an_error_twice() {
        let engine = MemEngine::new();
        let lease = engine.lease_grant(Duration::from_secs(10)).await.unwrap();
        engine
            .put("/lock/k", bytes("s"), PutOptions {
                lease: Some(lease),
                ..PutOptions::default()
            })
            .await
            .unwrap();

        engine.lease_revoke(lease).await.unwrap();
        let range = engine.range("/lock/k", RangeOptions::default()).await.unwrap();
        assert!(range.kvs.is_empty());
        assert!(engine.lease_revoke(lease).await.is_err());
    }
}
