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

//! Execution record endpoints.
//!
//! Workers post the started record before shell-out — it is the
//! system's only durable trace of execution intent — and the final
//! result after the run unwinds.

use std::sync::Arc;

use axum::{Json, extract::State};
use cronwheel_model::{ExecuteInfo, ExecuteResult};
use serde::Serialize;
use tracing::debug;

use crate::{Result, app::MasterState};

#[derive(Debug, Serialize)]
pub struct ExecutionCreated {
    pub execute_id: i64,
}

pub async fn create(
    State(state): State<Arc<MasterState>>,
    Json(info): Json<ExecuteInfo>,
) -> Result<Json<ExecutionCreated>> {
    let execute_id = state.executions.create(&info).await?;
    debug!(execute_id, job = info.job.id, worker = %info.worker, "execution record created");
    Ok(Json(ExecutionCreated { execute_id }))
}

pub async fn result(
    State(state): State<Arc<MasterState>>,
    Json(result): Json<ExecuteResult>,
) -> Result<Json<serde_json::Value>> {
    state.executions.record_result(&result).await?;
    debug!(execute_id = result.execute_id, status = ?result.status, "execution result recorded");
    Ok(Json(serde_json::json!({ "status": "success" })))
}
