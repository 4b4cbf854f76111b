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

//! In-flight and completed execution records.
//!
//! `ExecuteInfo` is posted to the master when a run is admitted (the
//! master assigns the execution id); `ExecuteResult` is posted when the
//! run finishes. The status tag is recorded *before* the cancellation
//! that caused it, so a killed or timed-out run reports the right reason.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Job;

/// Lifecycle tag of one execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecStatus {
    /// Admitted, command running (or about to).
    Start,
    /// Canceled by a kill event or lock-lease loss.
    Kill,
    /// Canceled by the per-job timeout.
    Timeout,
    /// Command exited successfully.
    Done,
    /// Command exited nonzero or failed to spawn.
    Error,
}

/// One admitted invocation of a job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecuteInfo {
    /// Assigned by the master when the started record is created; 0
    /// until then.
    #[serde(default)]
    pub execute_id: i64,

    pub job: Job,

    /// The cron occurrence that caused the run.
    pub planned_at: DateTime<Utc>,

    /// When the scheduling loop admitted the run.
    pub scheduled_at: DateTime<Utc>,

    /// When the command was actually spawned, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Name of the worker that admitted the run.
    pub worker: String,
}

/// Output placeholder recorded when a job does not save output.
pub const OUTPUT_DISCARDED: &str = "<output discarded>";

/// The final record of one invocation, emitted exactly once per admitted
/// execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResult {
    #[serde(default)]
    pub execute_id: i64,

    pub info: ExecuteInfo,

    /// Whether the command actually ran. False means the lock was denied
    /// (or reporting failed before shell-out) and the rest of the record
    /// carries no command outcome.
    pub ran: bool,

    /// Combined stdout+stderr, or [`OUTPUT_DISCARDED`].
    pub output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub started_at:  Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,

    pub status: ExecStatus,
}

impl ExecuteResult {
    /// A result for a run that never started (lock denied, reporting
    /// failure).
    #[must_use]
    pub fn not_run(info: ExecuteInfo, error: impl Into<String>) -> Self {
        Self {
            execute_id: info.execute_id,
            info,
            ran: false,
            output: String::new(),
            error: Some(error.into()),
            started_at: None,
            finished_at: Utc::now(),
            status: ExecStatus::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ExecStatus::Timeout).unwrap(), r#""timeout""#);
        let status: ExecStatus = serde_json::from_str(r#""kill""#).unwrap();
        assert_eq!(status, ExecStatus::Kill);
    }
}
