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

//! HTTP API surface.

pub mod category;
pub mod execute;
pub mod job;
pub mod lock;
pub mod worker;

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use prometheus::{Encoder, TextEncoder};

use crate::{app::MasterState, stream};

/// Assemble the full router: CRUD, lock endpoints, execution records,
/// worker listing, and the event stream.
pub fn router(state: Arc<MasterState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/v1/job", post(job::create))
        .route("/api/v1/job/list", get(job::list))
        .route("/api/v1/job/kill", post(job::kill))
        .route(
            "/api/v1/job/{category}/{id}",
            get(job::fetch).put(job::update).delete(job::remove),
        )
        .route("/api/v1/category", post(category::create).get(category::list))
        .route(
            "/api/v1/category/{name}",
            get(category::fetch).put(category::update).delete(category::remove),
        )
        .route("/api/v1/worker/list", get(worker::list))
        .route("/api/v1/lock/create", post(lock::create))
        .route("/api/v1/lock/lease", post(lock::lease))
        .route("/api/v1/lock/release/{lease_id}", delete(lock::release))
        .route("/api/v1/job/execute/create", post(execute::create))
        .route("/api/v1/job/execute/result/create", post(execute::result))
        .route("/websocket", get(stream::websocket_handler))
        .with_state(state)
}

async fn health_check() -> impl IntoResponse { (StatusCode::OK, "OK") }

/// Prometheus exposition of every metric registered in the process.
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(error) = encoder.encode(&prometheus::gather(), &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response();
    }
    (StatusCode::OK, buffer).into_response()
}
