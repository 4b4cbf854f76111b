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

pub const PREFIX_LABEL: &str = "prefix";

lazy_static! {
    pub static ref CONNECTED_CLIENTS: IntGauge = register_int_gauge!(
        "master_connected_clients",
        "Worker streams currently connected"
    )
    .unwrap();
    pub static ref CLIENTS_DROPPED: IntCounter = register_int_counter!(
        "master_clients_dropped_total",
        "Worker streams dropped for falling behind or failing writes"
    )
    .unwrap();
    pub static ref WATCH_EVENTS: IntCounterVec = register_int_counter_vec!(
        "master_watch_events_total",
        "Coordinator watch events translated, by prefix",
        &[PREFIX_LABEL]
    )
    .unwrap();
    pub static ref EVENTS_FANNED_OUT: IntCounter = register_int_counter!(
        "master_events_fanned_out_total",
        "Job events queued onto worker streams"
    )
    .unwrap();
    pub static ref SNAPSHOTS_SERVED: IntCounter = register_int_counter!(
        "master_snapshots_served_total",
        "Initial snapshots served to connecting workers"
    )
    .unwrap();
}
