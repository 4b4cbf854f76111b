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

use async_trait::async_trait;
use cronwheel_model::{ExecuteInfo, ExecuteResult};

use crate::Result;

/// Upstream record sink, implemented over the master's HTTP API in the
/// worker binary.
///
/// `execution_started` is load-bearing: its failure aborts the run
/// before shell-out, because the master's record of execution intent is
/// the only durable trace and running without it would corrupt
/// auditability.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Create the execution record; returns the assigned execution id.
    async fn execution_started(&self, info: &ExecuteInfo) -> Result<i64>;

    /// Deliver the final result record.
    async fn execution_finished(&self, result: &ExecuteResult) -> Result<()>;
}
