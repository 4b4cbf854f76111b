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

//! The control plane.
//!
//! Stores job and category definitions (through the repository seams),
//! mirrors them into the coordinator, watches the jobs and kill prefixes
//! and fans the resulting typed events out to every connected worker
//! stream, and serves the HTTP surfaces: job/category CRUD, execution
//! records, the proxied-lock endpoints, and the `/websocket` event
//! stream.

pub mod api;
mod app;
mod config;
mod error;
mod event_plane;
mod metrics;
mod registry;
mod repository;
mod server;
mod stream;

pub use app::{Master, MasterHandle, MasterState};
pub use config::MasterConfig;
pub use error::{Error, Result};
pub use event_plane::{PlanePrefix, run_event_plane};
pub use registry::ClientRegistry;
pub use repository::{
    ExecutionRepository, JobRepository, MemExecutionRepository, MemJobRepository,
};
pub use server::{ServiceHandler, start_rest_server};
