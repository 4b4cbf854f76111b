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

//! Job endpoints.
//!
//! Every write lands in the repository first and is then mirrored into
//! the coordinator, where the watch turns it into worker events. The
//! listing endpoint reads the mirror through the two-phase paginated
//! scan rather than the repository, so its order is the stable
//! creation-revision order.

use std::{sync::Arc, time::Duration};

use axum::{
    Json,
    extract::{Path, Query, State},
};
use cronwheel_base::KILL_MARKER_TTL_SECS;
use cronwheel_coordinator::{PutOptions, list_page};
use cronwheel_model::{Category, Job, JobPatch, KillMarker};
use serde::Deserialize;
use tracing::info;

use crate::{
    Result,
    app::MasterState,
    error::InvalidInputSnafu,
};

fn validate(job: &Job) -> Result<()> {
    if !Category::name_is_valid(&job.category) {
        return InvalidInputSnafu {
            what:    "job",
            message: format!("category {:?} is not usable as a path segment", job.category),
        }
        .fail();
    }
    if job.time.trim().is_empty() {
        return InvalidInputSnafu {
            what:    "job",
            message: "cron expression must not be empty",
        }
        .fail();
    }
    Ok(())
}

async fn mirror(state: &MasterState, job: &Job) -> Result<()> {
    let key = state.layout.job_key(&job.category, job.id);
    let value = serde_json::to_vec(job).expect("job serializes");
    state.engine.put(&key, value, PutOptions::default()).await?;
    Ok(())
}

pub async fn create(
    State(state): State<Arc<MasterState>>,
    Json(job): Json<Job>,
) -> Result<Json<Job>> {
    validate(&job)?;
    let job = state.jobs.save_job(job).await?;
    mirror(&state, &job).await?;
    info!(job = job.id, category = %job.category, "job created");
    Ok(Json(job))
}

pub async fn fetch(
    State(state): State<Arc<MasterState>>,
    Path((category, id)): Path<(String, i64)>,
) -> Result<Json<Job>> {
    Ok(Json(state.jobs.get_job(&category, id).await?))
}

pub async fn update(
    State(state): State<Arc<MasterState>>,
    Path((category, id)): Path<(String, i64)>,
    Json(patch): Json<JobPatch>,
) -> Result<Json<Job>> {
    let mut job = state.jobs.get_job(&category, id).await?;
    patch.apply(&mut job);
    validate(&job)?;
    let job = state.jobs.save_job(job).await?;
    mirror(&state, &job).await?;
    Ok(Json(job))
}

pub async fn remove(
    State(state): State<Arc<MasterState>>,
    Path((category, id)): Path<(String, i64)>,
) -> Result<Json<Job>> {
    let job = state.jobs.delete_job(&category, id).await?;
    let key = state.layout.job_key(&category, id);
    state.engine.delete(&key, false).await?;
    info!(job = id, category = %category, "job deleted");
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page:      usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

const fn default_page() -> usize { 1 }
const fn default_page_size() -> usize { 10 }

pub async fn list(
    State(state): State<Arc<MasterState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Job>>> {
    let rows = list_page(
        &*state.engine,
        &state.layout.jobs_prefix(),
        query.page,
        query.page_size.min(100),
    )
    .await?;
    let jobs = rows
        .iter()
        .filter_map(|kv| serde_json::from_slice(&kv.value).ok())
        .collect();
    Ok(Json(jobs))
}

/// Write the short-leased kill marker for a job. Whichever worker is
/// running it reacts within one watch round-trip.
pub async fn kill(
    State(state): State<Arc<MasterState>>,
    Json(marker): Json<KillMarker>,
) -> Result<Json<serde_json::Value>> {
    let lease = state
        .engine
        .lease_grant(Duration::from_secs(KILL_MARKER_TTL_SECS))
        .await?;
    let key = state.layout.kill_key(&marker.category, marker.job_id);
    let value = serde_json::to_vec(&marker).expect("kill marker serializes");
    state
        .engine
        .put(&key, value, PutOptions {
            lease:   Some(lease),
            prev_kv: false,
        })
        .await?;
    info!(job = marker.job_id, category = %marker.category, "kill marker written");
    Ok(Json(serde_json::json!({ "status": "success" })))
}
