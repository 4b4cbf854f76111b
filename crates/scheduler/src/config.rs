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

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Scheduler tuning knobs.
///
/// The inboxes are bounded on purpose: a full event inbox blocks the
/// stream reader, a full result inbox blocks the emitting executor (with
/// its lock still held), coupling admission pressure to drain rate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SmartDefault, bon::Builder)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Name this worker reports on its execution records.
    #[default = "worker"]
    pub worker_name: String,

    /// Capacity of the job event inbox.
    #[default = 1000]
    pub event_capacity: usize,

    /// Capacity of the execution result inbox.
    #[default = 500]
    pub result_capacity: usize,

    /// Sleep between scans while the plan table is empty, in seconds.
    #[default = 1]
    pub idle_tick_secs: u64,

    /// How long shutdown waits for in-flight executions to unwind, in
    /// seconds.
    #[default = 30]
    pub shutdown_grace_secs: u64,
}

impl SchedulerConfig {
    #[must_use]
    pub const fn idle_tick(&self) -> Duration { Duration::from_secs(self.idle_tick_secs) }

    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
