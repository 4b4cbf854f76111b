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

//! Category endpoints, mirrored like jobs.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use cronwheel_coordinator::PutOptions;
use cronwheel_model::{Category, CategoryPatch};
use tracing::info;

use crate::{
    Result,
    app::MasterState,
    error::InvalidInputSnafu,
};

async fn mirror(state: &MasterState, category: &Category) -> Result<()> {
    let key = state.layout.category_key(&category.name);
    let value = serde_json::to_vec(category).expect("category serializes");
    state.engine.put(&key, value, PutOptions::default()).await?;
    Ok(())
}

pub async fn create(
    State(state): State<Arc<MasterState>>,
    Json(category): Json<Category>,
) -> Result<Json<Category>> {
    if !Category::name_is_valid(&category.name) {
        return InvalidInputSnafu {
            what:    "category",
            message: format!("name {:?} is not usable as a path segment", category.name),
        }
        .fail();
    }
    let category = state.jobs.save_category(category).await?;
    mirror(&state, &category).await?;
    info!(category = %category.name, "category created");
    Ok(Json(category))
}

pub async fn fetch(
    State(state): State<Arc<MasterState>>,
    Path(name): Path<String>,
) -> Result<Json<Category>> {
    Ok(Json(state.jobs.get_category(&name).await?))
}

pub async fn list(State(state): State<Arc<MasterState>>) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.jobs.list_categories().await?))
}

pub async fn update(
    State(state): State<Arc<MasterState>>,
    Path(name): Path<String>,
    Json(patch): Json<CategoryPatch>,
) -> Result<Json<Category>> {
    let mut category = state.jobs.get_category(&name).await?;
    patch.apply(&mut category);
    let category = state.jobs.save_category(category).await?;
    mirror(&state, &category).await?;
    Ok(Json(category))
}

pub async fn remove(
    State(state): State<Arc<MasterState>>,
    Path(name): Path<String>,
) -> Result<Json<Category>> {
    let category = state.jobs.delete_category(&name).await?;
    state.engine.delete(&state.layout.category_key(&name), false).await?;
    info!(category = %name, "category deleted");
    Ok(Json(category))
}
