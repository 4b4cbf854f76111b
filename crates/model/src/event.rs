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

/// Wire-level kind of a job event. Encoded as a bare integer on the
/// stream: 0 = PUT, 1 = DELETE, 2 = KILL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum JobEventKind {
    Put,
    Delete,
    Kill,
}

impl From<JobEventKind> for u8 {
    fn from(kind: JobEventKind) -> Self {
        match kind {
            JobEventKind::Put => 0,
            JobEventKind::Delete => 1,
            JobEventKind::Kill => 2,
        }
    }
}

impl TryFrom<u8> for JobEventKind {
    type Error = UnknownEventKind;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Put),
            1 => Ok(Self::Delete),
            2 => Ok(Self::Kill),
            other => Err(UnknownEventKind(other)),
        }
    }
}

/// An event kind outside the {PUT, DELETE, KILL} set.
#[derive(Debug, thiserror::Error)]
#[error("unknown job event kind {0}")]
pub struct UnknownEventKind(pub u8);

/// A typed change to the job set, fanned out from the master to every
/// connected worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    #[serde(rename = "event")]
    pub kind: JobEventKind,
    pub job:  super::Job,
}

impl JobEvent {
    #[must_use]
    pub fn put(job: super::Job) -> Self {
        Self {
            kind: JobEventKind::Put,
            job,
        }
    }

    #[must_use]
    pub fn delete(job: super::Job) -> Self {
        Self {
            kind: JobEventKind::Delete,
            job,
        }
    }

    #[must_use]
    pub fn kill(job: super::Job) -> Self {
        Self {
            kind: JobEventKind::Kill,
            job,
        }
    }
}

/// Payload of a kill marker key, `<kill-prefix>/<category>/<id>`.
///
/// The marker itself is short-lived (5 s lease); whoever currently runs
/// the job reacts, everyone else ignores it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillMarker {
    pub category: String,
    pub job_id:   i64,
}
