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

use cronwheel_base::KeyLayout;
use cronwheel_coordinator::CoordinatorConfig;
use cronwheel_lock::LockConfig;
use cronwheel_scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Which lock flavor the executor uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LockFlavor {
    /// Worker owns the lease, renews against the coordinator directly.
    #[default]
    Cas,
    /// Master owns the lease; acquisition and renewal go through its
    /// lock endpoints.
    Proxy,
}

/// Worker process configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SmartDefault, bon::Builder)]
#[serde(default)]
pub struct WorkerConfig {
    /// Name under which this worker registers. Also stamped on every
    /// execution record it produces.
    #[default = "worker-1"]
    pub name: String,

    /// The master's HTTP root.
    #[default = "http://127.0.0.1:8220"]
    pub master_url: String,

    pub coordinator: CoordinatorConfig,

    pub layout: KeyLayout,

    pub lock: LockConfig,

    pub lock_flavor: LockFlavor,

    pub scheduler: SchedulerConfig,

    /// Base of the arithmetic reconnect backoff, in seconds (attempt ×
    /// base).
    #[default = 5]
    pub reconnect_interval_secs: u64,

    /// Reconnect attempts before the process gives up and exits.
    #[default = 10]
    pub reconnect_attempts: u32,

    /// TTL of the registration lease, in seconds.
    #[default = 10]
    pub registration_ttl_secs: u64,
}

impl WorkerConfig {
    /// The event stream URL derived from the master URL.
    #[must_use]
    pub fn websocket_url(&self) -> String {
        let base = self.master_url.trim_end_matches('/');
        let ws = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("ws://{base}")
        };
        format!("{ws}/websocket")
    }

    #[must_use]
    pub const fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }

    #[must_use]
    pub const fn registration_ttl(&self) -> Duration {
        Duration::from_secs(self.registration_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_url_rewrites_the_scheme() {
        let config = WorkerConfig {
            master_url: "http://master:8220".to_string(),
            ..WorkerConfig::default()
        };
        assert_eq!(config.websocket_url(), "ws://master:8220/websocket");

        let config = WorkerConfig {
            master_url: "https://master/".to_string(),
            ..WorkerConfig::default()
        };
        assert_eq!(config.websocket_url(), "wss://master/websocket");
    }
}
