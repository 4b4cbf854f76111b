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

//! Local replica of the category mirror.
//!
//! Snapshot-then-watch over the categories prefix, kept in a shared map
//! the executor consults when wrapping a job command with its
//! category's setup and teardown.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use cronwheel_base::KeyLayout;
use cronwheel_coordinator::{KvEngine, RangeOptions, WatchEventKind};
use cronwheel_model::Category;
use cronwheel_scheduler::CategoryDirectory;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::Result;

/// Shared category map, refreshed by a watch task.
#[derive(Clone)]
pub struct CategoryCache {
    map: Arc<RwLock<HashMap<String, Category>>>,
}

impl CategoryDirectory for CategoryCache {
    fn get(&self, name: &str) -> Option<Category> {
        self.map.read().unwrap().get(name).cloned()
    }
}

impl CategoryCache {
    /// Seed the cache and start following changes. The returned task
    /// runs until the engine's watch ends.
    pub async fn start(
        engine: Arc<dyn KvEngine>,
        layout: KeyLayout,
    ) -> Result<(Self, JoinHandle<()>)> {
        let prefix = layout.categories_prefix();
        let snapshot = engine.range(&prefix, RangeOptions::prefix()).await?;

        let mut seed = HashMap::new();
        for kv in &snapshot.kvs {
            match serde_json::from_slice::<Category>(&kv.value) {
                Ok(category) => {
                    seed.insert(category.name.clone(), category);
                }
                Err(error) => warn!(key = %kv.key, %error, "malformed category in mirror"),
            }
        }
        debug!(categories = seed.len(), "category cache seeded");

        let map = Arc::new(RwLock::new(seed));
        let mut watch = engine.watch(&prefix, snapshot.revision + 1, false).await?;

        let cache_map = map.clone();
        let join = tokio::spawn(async move {
            while let Some(batch) = watch.recv().await {
                let Ok(batch) = batch else { break };
                for event in batch {
                    match event.kind {
                        WatchEventKind::Put => {
                            match serde_json::from_slice::<Category>(&event.kv.value) {
                                Ok(category) => {
                                    cache_map
                                        .write()
                                        .unwrap()
                                        .insert(category.name.clone(), category);
                                }
                                Err(error) => {
                                    warn!(key = %event.kv.key, %error, "malformed category update");
                                }
                            }
                        }
                        WatchEventKind::Delete => {
                            if let Some(name) = event.kv.key.strip_prefix(&prefix) {
                                cache_map.write().unwrap().remove(name);
                            }
                        }
                    }
                }
            }
            debug!("category watch ended");
        });

        Ok((Self { map }, join))
    }
}

#[cfg(test)]
mod tests {
    use cronwheel_coordinator::{MemEngine, PutOptions};

    use super::*;

    fn category(name: &str, setup: Option<&str>) -> Category {
        Category {
            name:             name.to_string(),
            is_active:        true,
            check_command:    None,
            setup_command:    setup.map(str::to_string),
            teardown_command: None,
        }
    }

    #[tokio::test]
    async fn cache_seeds_and_follows_the_mirror() {
        let engine = MemEngine::new();
        let layout = KeyLayout::default();
        engine
            .put(
                &layout.category_key("default"),
                serde_json::to_vec(&category("default", None)).unwrap(),
                PutOptions::default(),
            )
            .await
            .unwrap();

        let (cache, _task) =
            CategoryCache::start(Arc::new(engine.clone()), layout.clone()).await.unwrap();
        assert!(cache.get("default").is_some());
        assert!(cache.get("other").is_none());

        engine
            .put(
                &layout.category_key("other"),
                serde_json::to_vec(&category("other", Some("cd /srv"))).unwrap(),
                PutOptions::default(),
            )
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(cache.get("other").unwrap().setup_command.as_deref(), Some("cd /srv"));

        engine.delete(&layout.category_key("default"), false).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(cache.get("default").is_none());
    }
}
