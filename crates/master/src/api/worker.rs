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

//! Worker listing, read straight from the registrations prefix.

use std::sync::Arc;

use axum::{Json, extract::State};
use cronwheel_coordinator::RangeOptions;
use cronwheel_model::WorkerMeta;

use crate::{Result, app::MasterState};

pub async fn list(State(state): State<Arc<MasterState>>) -> Result<Json<Vec<WorkerMeta>>> {
    let range = state
        .engine
        .range(&state.layout.workers_prefix(), RangeOptions::prefix())
        .await?;
    let workers = range
        .kvs
        .iter()
        .filter_map(|kv| serde_json::from_slice(&kv.value).ok())
        .collect();
    Ok(Json(workers))
}
