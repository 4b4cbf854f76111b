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

/// The unit of scheduling.
///
/// Jobs are created through the master's HTTP surface, mirrored into the
/// coordinator under `<jobs-prefix>/<category>/<id>` and replicated from
/// there into every worker's plan table. `(category, id)` is unique
/// across the cluster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Stable identifier, unique within the category.
    pub id: i64,

    /// Name of the category the job belongs to. Used as a coordinator
    /// path segment, so it must not contain `/`.
    pub category: String,

    /// Human-readable name.
    pub name: String,

    /// Cron expression, standard 5–7 field syntax (seconds optional).
    /// A job whose expression does not parse is skipped and logged.
    pub time: String,

    /// Shell command to run when the job fires.
    pub command: String,

    /// Inactive jobs keep their mirror entry but never fire.
    pub is_active: bool,

    /// Whether to capture combined stdout+stderr into the execution
    /// record. When false the output is replaced by a placeholder.
    pub save_output: bool,

    /// Timeout in seconds; `None` or 0 disables the timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Free-form description, not interpreted anywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Job {
    /// The effective timeout, if one is configured and positive.
    #[must_use]
    pub fn timeout_duration(&self) -> Option<Duration> {
        match self.timeout {
            Some(secs) if secs > 0 => Some(Duration::from_secs(secs)),
            _ => None,
        }
    }
}

/// Closed set of mutable job fields for partial updates.
///
/// Unknown fields are rejected rather than ignored so a typo in a client
/// payload fails loudly instead of silently doing nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobPatch {
    pub name:        Option<String>,
    pub time:        Option<String>,
    pub command:     Option<String>,
    pub is_active:   Option<bool>,
    pub save_output: Option<bool>,
    pub timeout:     Option<u64>,
    pub description: Option<String>,
}

impl JobPatch {
    /// Apply the patch to a job in place.
    pub fn apply(self, job: &mut Job) {
        if let Some(name) = self.name {
            job.name = name;
        }
        if let Some(time) = self.time {
            job.time = time;
        }
        if let Some(command) = self.command {
            job.command = command;
        }
        if let Some(is_active) = self.is_active {
            job.is_active = is_active;
        }
        if let Some(save_output) = self.save_output {
            job.save_output = save_output;
        }
        if let Some(timeout) = self.timeout {
            job.timeout = (timeout > 0).then_some(timeout);
        }
        if let Some(description) = self.description {
            job.description = (!description.is_empty()).then_some(description);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Job {
        Job {
            id:          7,
            category:    "default".to_string(),
            name:        "j".to_string(),
            time:        "*/5 * * * * *".to_string(),
            command:     "echo hi".to_string(),
            is_active:   true,
            save_output: true,
            timeout:     None,
            description: None,
        }
    }

    #[test]
    fn deserializes_the_mirror_snapshot_shape() {
        let raw = r#"{"id":7,"category":"default","name":"j","time":"*/5 * * * * *","command":"echo hi","is_active":true,"save_output":true}"#;
        let job: Job = serde_json::from_str(raw).unwrap();
        assert_eq!(job, sample());
    }

    #[test]
    fn timeout_duration_ignores_zero() {
        let mut job = sample();
        assert_eq!(job.timeout_duration(), None);
        job.timeout = Some(0);
        assert_eq!(job.timeout_duration(), None);
        job.timeout = Some(3);
        assert_eq!(job.timeout_duration(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn patch_applies_only_provided_fields() {
        let mut job = sample();
        let patch: JobPatch =
            serde_json::from_str(r#"{"command":"echo bye","is_active":false}"#).unwrap();
        patch.apply(&mut job);
        assert_eq!(job.command, "echo bye");
        assert!(!job.is_active);
        assert_eq!(job.name, "j");
    }

    #[test]
    fn patch_rejects_unknown_fields() {
        let err = serde_json::from_str::<JobPatch>(r#"{"commandd":"oops"}"#);
        assert!(err.is_err());
    }
}
