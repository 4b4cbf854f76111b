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

/// Timing constants of the lock protocol.
///
/// The defaults are coupled: one renewal interval plus slack must fit
/// inside the watchdog, and the watchdog inside the TTL, or a healthy
/// holder would lose its lock. 10 s / 5 s / 9 s leaves one full missed
/// renewal plus the 1 s retry backoff before the kill fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, SmartDefault, bon::Builder)]
#[serde(default)]
pub struct LockConfig {
    /// Lease TTL in seconds.
    #[default = 10]
    pub ttl_secs: u64,

    /// Renewal cadence in seconds.
    #[default = 5]
    pub renew_interval_secs: u64,

    /// Watchdog horizon in seconds: a holder that has not renewed
    /// successfully for this long is force-killed.
    #[default = 9]
    pub watchdog_secs: u64,
}

impl LockConfig {
    #[must_use]
    pub const fn ttl(&self) -> Duration { Duration::from_secs(self.ttl_secs) }

    #[must_use]
    pub const fn renew_interval(&self) -> Duration { Duration::from_secs(self.renew_interval_secs) }

    #[must_use]
    pub const fn watchdog(&self) -> Duration { Duration::from_secs(self.watchdog_secs) }
}
