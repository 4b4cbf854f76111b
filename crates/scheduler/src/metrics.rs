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

pub const EVENT_LABEL: &str = "event";
pub const STATUS_LABEL: &str = "status";

lazy_static! {
    pub static ref SCHEDULER_EVENTS: IntCounterVec = register_int_counter_vec!(
        "scheduler_events_total",
        "Job events consumed by the scheduler, by kind",
        &[EVENT_LABEL]
    )
    .unwrap();
    pub static ref EXECUTIONS_LAUNCHED: IntCounter = register_int_counter!(
        "scheduler_executions_launched_total",
        "Executions admitted and handed to the executor"
    )
    .unwrap();
    pub static ref EXECUTIONS_OVERRUN_SKIPS: IntCounter = register_int_counter!(
        "scheduler_overrun_skips_total",
        "Ticks skipped because the previous execution was still running"
    )
    .unwrap();
    pub static ref EXECUTIONS_ACTIVE: IntGauge = register_int_gauge!(
        "scheduler_executions_active",
        "Executions currently tracked in the execution table"
    )
    .unwrap();
    pub static ref RESULTS_FINISHED: IntCounterVec = register_int_counter_vec!(
        "scheduler_results_total",
        "Execution results drained from the result inbox, by final status",
        &[STATUS_LABEL]
    )
    .unwrap();
    pub static ref RESULTS_DISCARDED: IntCounter = register_int_counter!(
        "scheduler_results_discarded_total",
        "Results dropped because the lock was denied (ran=false)"
    )
    .unwrap();
    pub static ref PLANS_ACTIVE: IntGauge = register_int_gauge!(
        "scheduler_plans_active",
        "Entries currently in the plan table"
    )
    .unwrap();
    pub static ref PLAN_PARSE_FAILURES: IntCounter = register_int_counter!(
        "scheduler_plan_parse_failures_total",
        "Job events skipped because the cron expression did not parse"
    )
    .unwrap();
}
