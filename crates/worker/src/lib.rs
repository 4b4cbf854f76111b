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

//! The worker process.
//!
//! Connects to the master's event stream, feeds the scheduler's event
//! inbox, registers itself under an auto-renewed coordinator lease, and
//! reports execution records back over HTTP. Scheduling and execution
//! themselves live in `cronwheel-scheduler`; this crate is the binding
//! around them.

mod app;
mod categories;
mod config;
mod error;
mod register;
mod report;
mod stream;

pub use app::{WorkerApp, WorkerHandle};
pub use categories::CategoryCache;
pub use config::{LockFlavor, WorkerConfig};
pub use error::{Error, Result};
pub use register::Registration;
pub use report::HttpReporter;
pub use stream::StreamClient;
