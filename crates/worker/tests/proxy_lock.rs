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

//! Proxied lock flavor over a real master: acquisition, renewal,
//! contention, release, and forced kill when the master stops honoring
//! renewals. Short TTLs keep the real-clock runs quick.

use std::{sync::Arc, time::Duration};

use cronwheel_coordinator::{KvEngine, MemEngine};
use cronwheel_lock::{Error, HandleState, LockConfig, LockManager, ProxyLockManager};
use cronwheel_master::{Master, MasterConfig, MasterHandle};

async fn start_master() -> (MasterHandle, String) {
    let engine: Arc<dyn KvEngine> = Arc::new(MemEngine::new());
    let mut master = Master::new(
        MasterConfig {
            bind_address: "127.0.0.1:0".to_string(),
            ..MasterConfig::default()
        },
        engine,
    )
    .start()
    .await
    .unwrap();
    master.wait_for_start().await;
    let url = format!("http://{}", master.local_addr());
    (master, url)
}

fn fast_config() -> LockConfig {
    LockConfig {
        ttl_secs:            2,
        renew_interval_secs: 1,
        watchdog_secs:       2,
    }
}

#[tokio::test]
async fn acquire_contend_hold_and_release_over_http() {
    let (master, url) = start_master().await;
    let locks = ProxyLockManager::new(url.clone(), fast_config());

    let handle = locks.try_acquire("jobs/default/21").await.unwrap();
    assert!(handle.lease_id() > 0);
    assert!(!handle.secret().is_empty());

    let denied = locks.try_acquire("jobs/default/21").await.unwrap_err();
    assert!(matches!(denied, Error::AlreadyHeld { .. }));

    // Hold well past the TTL: the 1 s renewals must keep the
    // master-side watchdog at bay.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(handle.kill_signal().current(), HandleState::Held);

    handle.release().await;

    let reacquired = locks.try_acquire("jobs/default/21").await.unwrap();
    reacquired.release().await;
    master.shutdown();
}

#[tokio::test]
async fn refused_renewals_force_a_kill_within_the_ttl() {
    let (master, url) = start_master().await;
    let locks = ProxyLockManager::new(url.clone(), fast_config());

    let handle = locks.try_acquire("jobs/default/23").await.unwrap();
    let kill_signal = handle.kill_signal();

    // Pull the registration out from under the holder: every further
    // renewal is refused with an unknown lease.
    let response = reqwest::Client::new()
        .delete(format!("{url}/api/v1/lock/release/{}", handle.lease_id()))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let state = tokio::time::timeout(Duration::from_secs(5), kill_signal.wait())
        .await
        .expect("kill must fire within TTL plus slack");
    assert_eq!(state, HandleState::NeedsKill);
    master.shutdown();
}
