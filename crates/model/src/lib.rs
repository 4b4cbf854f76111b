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

//! Canonical data model.
//!
//! One definition of every entity that crosses a process boundary: jobs
//! and categories as they are mirrored into the coordinator, the typed
//! job events pushed to workers, and the execution records reported back
//! to the master. Both the master and the worker link against this crate;
//! there is no parallel copy of any of these types anywhere else.

mod category;
mod event;
mod execute;
mod job;
mod worker;

pub use category::{Category, CategoryPatch};
pub use event::{JobEvent, JobEventKind, KillMarker};
pub use execute::{ExecStatus, ExecuteInfo, ExecuteResult, OUTPUT_DISCARDED};
pub use job::{Job, JobPatch};
pub use worker::WorkerMeta;
