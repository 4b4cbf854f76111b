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

use lazy_static::lazy_static;
use prometheus::*;

pub const FLAVOR_LABEL: &str = "flavor";

pub const FLAVOR_CAS: &str = "cas";
pub const FLAVOR_PROXY: &str = "proxy";

lazy_static! {
    pub static ref LOCK_ACQUIRED: IntCounterVec = register_int_counter_vec!(
        "lock_acquired_total",
        "Total number of successful lock acquisitions",
        &[FLAVOR_LABEL]
    )
    .unwrap();
    pub static ref LOCK_CONTENDED: IntCounterVec = register_int_counter_vec!(
        "lock_contended_total",
        "Total number of acquisitions denied because the lock was held",
        &[FLAVOR_LABEL]
    )
    .unwrap();
    pub static ref LOCK_RELEASED: IntCounterVec = register_int_counter_vec!(
        "lock_released_total",
        "Total number of voluntary lock releases",
        &[FLAVOR_LABEL]
    )
    .unwrap();
    pub static ref LOCK_RENEWAL_FAILURES: IntCounterVec = register_int_counter_vec!(
        "lock_renewal_failures_total",
        "Total number of failed lock renewals",
        &[FLAVOR_LABEL]
    )
    .unwrap();
    pub static ref LOCK_FORCED_KILLS: IntCounterVec = register_int_counter_vec!(
        "lock_forced_kills_total",
        "Total number of locks force-killed after renewal liveness was lost",
        &[FLAVOR_LABEL]
    )
    .unwrap();
}
