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

//! Proxied-lock HTTP endpoints.
//!
//! Create answers 200 with the grant or 400 with a message; lease and
//! release always answer 200 with a `{status, message}` body — renewal
//! callers poll at a fixed cadence and react to the status field, not
//! the HTTP code.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Form, Path, State},
};
use cronwheel_lock::{LockCreated, LockOpStatus};
use serde::Deserialize;

use crate::{Result, app::MasterState};

#[derive(Debug, Deserialize)]
pub struct CreateForm {
    pub name: String,
    #[serde(default)]
    pub ttl:  Option<u64>,
}

pub async fn create(
    State(state): State<Arc<MasterState>>,
    Form(form): Form<CreateForm>,
) -> Result<Json<LockCreated>> {
    let grant = state.locks.create(&form.name, form.ttl).await?;
    Ok(Json(LockCreated {
        name:      grant.name,
        ttl:       grant.ttl_secs,
        password:  grant.password,
        lease_id:  grant.lease_id,
        is_active: true,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LeaseForm {
    pub lease_id: i64,
    pub password: String,
}

pub async fn lease(
    State(state): State<Arc<MasterState>>,
    Form(form): Form<LeaseForm>,
) -> Json<LockOpStatus> {
    match state.locks.renew(form.lease_id, &form.password).await {
        Ok(()) => Json(LockOpStatus::success("lease extended")),
        Err(error) => Json(LockOpStatus::error(error.to_string())),
    }
}

pub async fn release(
    State(state): State<Arc<MasterState>>,
    Path(lease_id): Path<i64>,
) -> Json<LockOpStatus> {
    match state.locks.release(lease_id).await {
        Ok(()) => Json(LockOpStatus::success("released")),
        Err(error) => Json(LockOpStatus::error(error.to_string())),
    }
}
