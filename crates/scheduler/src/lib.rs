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

//! Worker-side scheduler.
//!
//! One task owns the plan table and the execution table; job events are
//! serialized onto it through a bounded inbox, so neither table ever
//! needs a lock. The scheduling loop scans due plans, admits executions
//! through the overrun gate, and hands them to the [`Executor`], which
//! owns the distributed lock, the child process, and the emission of
//! exactly one [`ExecuteResult`](cronwheel_model::ExecuteResult) per
//! admitted run.

mod config;
pub mod error;
mod execute;
mod executor;
mod metrics;
mod plan;
mod report;
mod scheduler;

pub use config::SchedulerConfig;
pub use error::{Error, Result};
pub use execute::Execution;
pub use executor::{CategoryDirectory, Executor, NoCategories, ShellExecutor};
pub use plan::SchedulePlan;
pub use report::Reporter;
pub use scheduler::{Scheduler, SchedulerHandle};
