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

//! Lock protocol laws: mutual exclusion, renewal liveness, and forced
//! kill on renewal failure. All timing runs on the paused tokio clock
//! against the in-memory coordinator.

use std::{sync::Arc, time::Duration};

use cronwheel_base::KeyLayout;
use cronwheel_coordinator::{KvEngine, MemEngine, RangeOptions};
use cronwheel_lock::{CasLockManager, Error, HandleState, LockConfig, LockManager};
use tokio::time::Instant;

fn manager(engine: &MemEngine) -> CasLockManager {
    CasLockManager::new(
        Arc::new(engine.clone()),
        KeyLayout::default(),
        LockConfig::default(),
    )
}

#[tokio::test]
async fn exactly_one_of_two_racing_acquirers_wins() {
    let engine = MemEngine::new();
    let first = manager(&engine);
    let second = manager(&engine);

    let (a, b) = tokio::join!(
        first.try_acquire("jobs/default/7"),
        second.try_acquire("jobs/default/7"),
    );

    let (winner, loser) = match (a, b) {
        (Ok(handle), Err(err)) | (Err(err), Ok(handle)) => (handle, err),
        (Ok(_), Ok(_)) => panic!("both acquirers won"),
        (Err(a), Err(b)) => panic!("both acquirers lost: {a}, {b}"),
    };
    assert!(matches!(loser, Error::AlreadyHeld { .. }));

    // The loser's scratch lease must not linger as coordinator garbage.
    assert_eq!(winner.kill_signal().current(), HandleState::Held);
    winner.release().await;
}

#[tokio::test]
async fn released_locks_can_be_reacquired() {
    let engine = MemEngine::new();
    let locks = manager(&engine);

    let handle = locks.try_acquire("jobs/default/1").await.unwrap();
    handle.release().await;

    let key = KeyLayout::default().lock_key("jobs/default/1");
    assert!(engine.range(&key, RangeOptions::default()).await.unwrap().kvs.is_empty());

    let handle = locks.try_acquire("jobs/default/1").await.unwrap();
    handle.release().await;
}

#[tokio::test(start_paused = true)]
async fn renewal_liveness_keeps_the_lock_through_long_work() {
    let engine = MemEngine::new();
    let locks = manager(&engine);

    let handle = locks.try_acquire("jobs/default/2").await.unwrap();
    let lease = handle.lease_id();

    // A command sleeping well past the 10 s TTL: renewals every 5 s must
    // keep the lease alive the whole time.
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(engine.lease_exists(lease));
    assert_eq!(handle.kill_signal().current(), HandleState::Held);
    let key = KeyLayout::default().lock_key("jobs/default/2");
    assert_eq!(engine.range(&key, RangeOptions::default()).await.unwrap().kvs.len(), 1);

    handle.release().await;
}

#[tokio::test(start_paused = true)]
async fn renewal_failure_kills_within_ttl_plus_slack() {
    let engine = MemEngine::new();
    let locks = manager(&engine);
    let config = LockConfig::default();

    let acquired_at = Instant::now();
    let handle = locks.try_acquire("jobs/default/3").await.unwrap();

    // Injected lease loss: every subsequent keep-alive is refused.
    engine.lease_revoke(handle.lease_id()).await.unwrap();

    let state = tokio::time::timeout(
        config.ttl() + Duration::from_secs(1),
        handle.kill_signal().wait(),
    )
    .await
    .expect("kill must fire within TTL + 1s");
    assert_eq!(state, HandleState::NeedsKill);
    assert!(acquired_at.elapsed() <= config.ttl() + Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn release_resolves_observers_with_the_no_kill_sentinel() {
    let engine = MemEngine::new();
    let locks = manager(&engine);

    let handle = locks.try_acquire("jobs/default/4").await.unwrap();
    let observer = tokio::spawn(handle.kill_signal().wait());

    tokio::time::sleep(Duration::from_secs(2)).await;
    handle.release().await;

    let state = tokio::time::timeout(Duration::from_secs(1), observer)
        .await
        .expect("observer must wake on release")
        .unwrap();
    assert_eq!(state, HandleState::Released);
}
