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

//! Stability of the two-phase paginated listing under concurrent PUTs.

use std::collections::HashSet;

use cronwheel_coordinator::{KvEngine, MemEngine, PutOptions, list_page};

async fn seed(engine: &MemEngine, prefix: &str, count: usize) {
    for i in 0..count {
        engine
            .put(
                &format!("{prefix}job-{i:03}"),
                format!("v{i}").into_bytes(),
                PutOptions::default(),
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn pages_partition_the_prefix() {
    let engine = MemEngine::new();
    seed(&engine, "/crontab/jobs/", 25).await;

    let mut seen = Vec::new();
    for page in 1.. {
        let rows = list_page(&engine, "/crontab/jobs/", page, 10).await.unwrap();
        if rows.is_empty() {
            break;
        }
        seen.extend(rows.into_iter().map(|kv| kv.key));
    }

    assert_eq!(seen.len(), 25);
    let unique: HashSet<_> = seen.iter().collect();
    assert_eq!(unique.len(), 25, "no key may be returned twice");
}

#[tokio::test]
async fn concurrent_puts_never_shift_earlier_pages() {
    let engine = MemEngine::new();
    seed(&engine, "/crontab/jobs/", 10).await;

    let page_one = list_page(&engine, "/crontab/jobs/", 1, 5).await.unwrap();

    // New keys land between the two phases of every later listing; their
    // creation revisions are strictly larger, so page positions hold.
    seed(&engine, "/crontab/jobs/", 13).await; // overwrites 0..10, adds 10..13

    let page_one_again = list_page(&engine, "/crontab/jobs/", 1, 5).await.unwrap();
    let keys: Vec<_> = page_one.iter().map(|kv| kv.key.clone()).collect();
    let keys_again: Vec<_> = page_one_again.iter().map(|kv| kv.key.clone()).collect();
    assert_eq!(keys, keys_again);

    let mut all = Vec::new();
    for page in 1..=3 {
        all.extend(
            list_page(&engine, "/crontab/jobs/", page, 5)
                .await
                .unwrap()
                .into_iter()
                .map(|kv| kv.key),
        );
    }
    assert_eq!(all.len(), 13);
    let unique: HashSet<_> = all.iter().collect();
    assert_eq!(unique.len(), 13, "keys present throughout are neither skipped nor repeated");
}

#[tokio::test]
async fn empty_prefix_yields_empty_pages() {
    let engine = MemEngine::new();
    assert!(list_page(&engine, "/crontab/jobs/", 1, 10).await.unwrap().is_empty());
    assert!(list_page(&engine, "/crontab/jobs/", 4, 10).await.unwrap().is_empty());
}
