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

//! Typed messages carried inside stream frames.
//!
//! Every frame payload is a JSON envelope `{category, data}`. The
//! category string selects how `data` is interpreted; an unknown
//! category is logged and skipped by the receiver rather than killing
//! the connection, so the two sides can evolve independently.

use std::str::FromStr;

use bytes::Bytes;
use cronwheel_model::JobEvent;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::frame::{self, FrameError};

/// Message categories both sides understand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display, strum_macros::EnumString)]
pub enum MessageCategory {
    /// Master → worker: one job event (snapshot or steady-state).
    #[strum(serialize = "jobEvent")]
    JobEvent,
    /// Worker → master: request the initial snapshot.
    #[strum(serialize = "getJobs")]
    GetJobs,
    /// Worker → master: acquire a lock (proxied flavor).
    #[strum(serialize = "tryLock")]
    TryLock,
    /// Worker → master: renew a held lock (proxied flavor).
    #[strum(serialize = "leaseLock")]
    LeaseLock,
    /// Worker → master: release a held lock (proxied flavor).
    #[strum(serialize = "releaseLock")]
    ReleaseLock,
}

/// The JSON payload of every frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub category: String,
    #[serde(default)]
    pub data:     serde_json::Value,
}

/// Errors decoding or encoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("frame error")]
    Frame(#[from] FrameError),

    #[error("malformed message payload")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MessageError>;

impl Envelope {
    /// Build an envelope with a serializable body.
    pub fn new(category: MessageCategory, data: &impl Serialize) -> Result<Self> {
        Ok(Self {
            category: category.to_string(),
            data:     serde_json::to_value(data)?,
        })
    }

    /// The `getJobs` snapshot request (no body).
    #[must_use]
    pub fn get_jobs() -> Self {
        Self {
            category: MessageCategory::GetJobs.to_string(),
            data:     serde_json::Value::Null,
        }
    }

    /// A `jobEvent` envelope.
    pub fn job_event(event: &JobEvent) -> Result<Self> {
        Self::new(MessageCategory::JobEvent, event)
    }

    /// The parsed category, `None` for categories this build does not
    /// know.
    #[must_use]
    pub fn known_category(&self) -> Option<MessageCategory> {
        MessageCategory::from_str(&self.category).ok()
    }

    /// Interpret the body as `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }

    /// Serialize and wrap into a single wire frame.
    pub fn into_frame(&self) -> Result<Bytes> {
        let payload = serde_json::to_vec(self)?;
        Ok(frame::pack(&payload)?)
    }

    /// Parse an envelope out of one frame payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Body of the `tryLock`/`leaseLock`/`releaseLock` messages and the
/// matching HTTP lock endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRequest {
    /// Lease id, 0 on `tryLock`.
    #[serde(default)]
    pub id:     i64,
    pub name:   String,
    pub secret: String,
}
