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

//! Coordinator adapter.
//!
//! The only code in the workspace that speaks the coordinator's wire
//! protocol. Everything above it programs against [`KvEngine`], which has
//! two implementations:
//!
//! - [`EtcdEngine`] — the production backend over `etcd-client`
//! - [`MemEngine`] — a complete in-memory engine with revisions, leases,
//!   and watch replay, used by every timing-sensitive test in the
//!   workspace
//!
//! Revision semantics follow etcd: a single monotonically increasing
//! store revision, immutable per-key creation revisions (the anchor for
//! both CAS lock acquisition and stable pagination), and watches that
//! deliver changes in revision order starting from a caller-chosen
//! revision.

mod config;
mod engine;
mod error;
mod etcd;
mod memory;
mod types;

pub use config::CoordinatorConfig;
pub use engine::{KvEngine, Watch, list_page};
pub use error::{Error, Result};
pub use etcd::EtcdEngine;
pub use memory::MemEngine;
pub use types::{
    CasOutcome, CreateRevisionOrder, KeyValue, LeaseId, PutOptions, RangeOptions, RangeResult,
    WatchEvent, WatchEventKind,
};
