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

//! Coordinator key layout.
//!
//! Every process in the cluster derives coordinator keys from the same
//! [`KeyLayout`] so the master's watches and the workers' locks line up.
//! The layout is rooted at a configurable path segment (default
//! `/crontab`) with one sub-prefix per concern:
//!
//! ```text
//! /crontab/jobs/<category>/<id>      job mirror (JSON job snapshot)
//! /crontab/categories/<name>         category mirror (JSON snapshot)
//! /crontab/kill/<category>/<id>      kill marker, short lease
//! /crontab/lock/<name>               lock key, value = secret, leased
//! /crontab/workers/<name>            worker registration, leased
//! ```
//!
//! Category names double as path segments and therefore must not contain
//! `/`; the master's API layer rejects such names before they reach the
//! coordinator.

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Root-relative layout of all coordinator keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SmartDefault)]
#[serde(default)]
pub struct KeyLayout {
    /// Root path segment all prefixes hang off.
    #[default = "/crontab"]
    pub root: String,
}

impl KeyLayout {
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        let mut root = root.into();
        while root.ends_with('/') {
            root.pop();
        }
        Self { root }
    }

    /// Prefix the job mirror lives under, trailing slash included.
    #[must_use]
    pub fn jobs_prefix(&self) -> String { format!("{}/jobs/", self.root) }

    /// Key of one mirrored job.
    #[must_use]
    pub fn job_key(&self, category: &str, id: i64) -> String {
        format!("{}{category}/{id}", self.jobs_prefix())
    }

    /// Prefix the category mirror lives under.
    #[must_use]
    pub fn categories_prefix(&self) -> String { format!("{}/categories/", self.root) }

    /// Key of one mirrored category.
    #[must_use]
    pub fn category_key(&self, name: &str) -> String {
        format!("{}{name}", self.categories_prefix())
    }

    /// Prefix kill markers live under.
    #[must_use]
    pub fn kill_prefix(&self) -> String { format!("{}/kill/", self.root) }

    /// Key of the kill marker for one job.
    #[must_use]
    pub fn kill_key(&self, category: &str, id: i64) -> String {
        format!("{}{category}/{id}", self.kill_prefix())
    }

    /// Prefix lock keys live under.
    #[must_use]
    pub fn locks_prefix(&self) -> String { format!("{}/lock/", self.root) }

    /// Key of one named lock. Lock names may themselves contain `/`
    /// (job locks are named `jobs/<category>/<id>`).
    #[must_use]
    pub fn lock_key(&self, name: &str) -> String { format!("{}{name}", self.locks_prefix()) }

    /// Prefix worker registrations live under.
    #[must_use]
    pub fn workers_prefix(&self) -> String { format!("{}/workers/", self.root) }

    /// Key of one worker registration.
    #[must_use]
    pub fn worker_key(&self, name: &str) -> String { format!("{}{name}", self.workers_prefix()) }

    /// Name of the distributed lock guarding one job.
    #[must_use]
    pub fn job_lock_name(category: &str, id: i64) -> String { format!("jobs/{category}/{id}") }

    /// Split a key under `<prefix><category>/<id>` back into its parts.
    ///
    /// Returns `None` when the key is not under the prefix or the tail is
    /// not exactly two segments with a numeric id.
    #[must_use]
    pub fn split_category_id<'k>(prefix: &str, key: &'k str) -> Option<(&'k str, i64)> {
        let tail = key.strip_prefix(prefix)?;
        let (category, id) = tail.split_once('/')?;
        if category.is_empty() || id.contains('/') {
            return None;
        }
        Some((category, id.parse().ok()?))
    }
}

/// Key of one job in a worker's plan and execution tables.
#[must_use]
pub fn plan_key(category: &str, id: i64) -> String { format!("{category}-{id}") }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_prefixes() {
        let layout = KeyLayout::default();
        assert_eq!(layout.jobs_prefix(), "/crontab/jobs/");
        assert_eq!(layout.categories_prefix(), "/crontab/categories/");
        assert_eq!(layout.kill_prefix(), "/crontab/kill/");
        assert_eq!(layout.locks_prefix(), "/crontab/lock/");
        assert_eq!(layout.workers_prefix(), "/crontab/workers/");
    }

    #[test]
    fn keys_compose_with_custom_root() {
        let layout = KeyLayout::new("/test/");
        assert_eq!(layout.job_key("default", 7), "/test/jobs/default/7");
        assert_eq!(layout.kill_key("default", 7), "/test/kill/default/7");
        assert_eq!(
            layout.lock_key(&KeyLayout::job_lock_name("default", 7)),
            "/test/lock/jobs/default/7"
        );
    }

    #[test]
    fn split_category_id_round_trips() {
        let layout = KeyLayout::default();
        let key = layout.job_key("default", 42);
        assert_eq!(
            KeyLayout::split_category_id(&layout.jobs_prefix(), &key),
            Some(("default", 42))
        );
    }

    #[test]
    fn split_rejects_foreign_and_malformed_keys() {
        let prefix = "/crontab/jobs/";
        assert_eq!(KeyLayout::split_category_id(prefix, "/other/jobs/a/1"), None);
        assert_eq!(KeyLayout::split_category_id(prefix, "/crontab/jobs/a"), None);
        assert_eq!(
            KeyLayout::split_category_id(prefix, "/crontab/jobs/a/not-a-number"),
            None
        );
        assert_eq!(KeyLayout::split_category_id(prefix, "/crontab/jobs/a/1/2"), None);
    }

    #[test]
    fn plan_key_format() {
        assert_eq!(plan_key("default", 7), "default-7");
    }
}
