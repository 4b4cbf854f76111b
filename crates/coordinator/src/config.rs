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

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Connection settings for the etcd-backed engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SmartDefault, bon::Builder)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Coordinator endpoints, host:port.
    #[default(_code = "vec![\"127.0.0.1:2379\".to_string()]")]
    pub endpoints: Vec<String>,

    /// Dial timeout in seconds.
    #[default = 5]
    pub connect_timeout_secs: u64,
}
