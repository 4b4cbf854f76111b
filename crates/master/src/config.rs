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

use cronwheel_base::KeyLayout;
use cronwheel_lock::LockConfig;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Master process configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SmartDefault, bon::Builder)]
#[serde(default)]
pub struct MasterConfig {
    /// Address the HTTP server (API + event stream) binds.
    #[default = "127.0.0.1:8220"]
    pub bind_address: String,

    /// Whether to enable permissive CORS on the API.
    #[default = true]
    pub enable_cors: bool,

    /// Per-client outbound event queue depth; a worker that falls this
    /// far behind is disconnected and re-snapshots.
    #[default = 1000]
    pub client_queue_depth: usize,

    /// Coordinator key layout shared with every worker.
    pub layout: KeyLayout,

    /// Timing constants for proxied locks.
    pub lock: LockConfig,
}
