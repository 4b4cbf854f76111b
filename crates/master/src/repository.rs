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

//! Persistence seams.
//!
//! Canonical job, category, and execution records live behind these
//! traits; the coordinator only ever holds the mirror. The in-memory
//! implementations back tests and single-node deployments — a relational
//! store slots in behind the same traits without touching the core.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicI64, Ordering},
    },
};

use async_trait::async_trait;
use cronwheel_model::{Category, ExecuteInfo, ExecuteResult, Job};

use crate::{
    Result,
    error::NotFoundSnafu,
};

/// Canonical storage of jobs and categories.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert or update; a job with id 0 gets a fresh id assigned.
    async fn save_job(&self, job: Job) -> Result<Job>;

    async fn get_job(&self, category: &str, id: i64) -> Result<Job>;

    async fn delete_job(&self, category: &str, id: i64) -> Result<Job>;

    async fn save_category(&self, category: Category) -> Result<Category>;

    async fn get_category(&self, name: &str) -> Result<Category>;

    async fn delete_category(&self, name: &str) -> Result<Category>;

    async fn list_categories(&self) -> Result<Vec<Category>>;
}

/// Canonical storage of execution records.
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    /// Create the record of an admitted run; returns the execution id.
    async fn create(&self, info: &ExecuteInfo) -> Result<i64>;

    /// Attach the final result to an execution record.
    async fn record_result(&self, result: &ExecuteResult) -> Result<()>;
}

/// In-memory job store.
#[derive(Default)]
pub struct MemJobRepository {
    jobs:       Mutex<HashMap<(String, i64), Job>>,
    categories: Mutex<HashMap<String, Category>>,
    next_id:    AtomicI64,
}

impl MemJobRepository {
    #[must_use]
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl JobRepository for MemJobRepository {
    async fn save_job(&self, mut job: Job) -> Result<Job> {
        if job.id == 0 {
            job.id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        }
        self.jobs
            .lock()
            .unwrap()
            .insert((job.category.clone(), job.id), job.clone());
        Ok(job)
    }

    async fn get_job(&self, category: &str, id: i64) -> Result<Job> {
        self.jobs
            .lock()
            .unwrap()
            .get(&(category.to_string(), id))
            .cloned()
            .ok_or_else(|| {
                NotFoundSnafu {
                    what: format!("job {category}/{id}"),
                }
                .build()
            })
    }

    async fn delete_job(&self, category: &str, id: i64) -> Result<Job> {
        self.jobs
            .lock()
            .unwrap()
            .remove(&(category.to_string(), id))
            .ok_or_else(|| {
                NotFoundSnafu {
                    what: format!("job {category}/{id}"),
                }
                .build()
            })
    }

    async fn save_category(&self, category: Category) -> Result<Category> {
        self.categories
            .lock()
            .unwrap()
            .insert(category.name.clone(), category.clone());
        Ok(category)
    }

    async fn get_category(&self, name: &str) -> Result<Category> {
        self.categories.lock().unwrap().get(name).cloned().ok_or_else(|| {
            NotFoundSnafu {
                what: format!("category {name}"),
            }
            .build()
        })
    }

    async fn delete_category(&self, name: &str) -> Result<Category> {
        self.categories.lock().unwrap().remove(name).ok_or_else(|| {
            NotFoundSnafu {
                what: format!("category {name}"),
            }
            .build()
        })
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut categories: Vec<Category> =
            self.categories.lock().unwrap().values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }
}

/// In-memory execution record store.
#[derive(Default)]
pub struct MemExecutionRepository {
    next_id: AtomicI64,
    records: Mutex<HashMap<i64, (ExecuteInfo, Option<ExecuteResult>)>>,
}

impl MemExecutionRepository {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Number of stored records. Test helper.
    #[must_use]
    pub fn len(&self) -> usize { self.records.lock().unwrap().len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.records.lock().unwrap().is_empty() }

    /// Fetch one record. Test helper.
    #[must_use]
    pub fn get(&self, id: i64) -> Option<(ExecuteInfo, Option<ExecuteResult>)> {
        self.records.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl ExecutionRepository for MemExecutionRepository {
    async fn create(&self, info: &ExecuteInfo) -> Result<i64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut info = info.clone();
        info.execute_id = id;
        self.records.lock().unwrap().insert(id, (info, None));
        Ok(id)
    }

    async fn record_result(&self, result: &ExecuteResult) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let Some(record) = records.get_mut(&result.execute_id) else {
            return NotFoundSnafu {
                what: format!("execution {}", result.execute_id),
            }
            .fail();
        };
        record.1 = Some(result.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn job() -> Job {
        serde_json::from_value(serde_json::json!({
            "id": 0,
            "category": "default",
            "name": "j",
            "time": "* * * * *",
            "command": "true",
            "is_active": true,
            "save_output": false,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn save_assigns_ids_to_new_jobs() {
        let repo = MemJobRepository::new();
        let first = repo.save_job(job()).await.unwrap();
        let second = repo.save_job(job()).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(repo.get_job("default", 1).await.unwrap().name, "j");
    }

    #[tokio::test]
    async fn execution_records_round_trip() {
        let repo = MemExecutionRepository::new();
        let info = ExecuteInfo {
            execute_id:   0,
            job:          job(),
            planned_at:   Utc::now(),
            scheduled_at: Utc::now(),
            started_at:   None,
            worker:       "w".to_string(),
        };
        let id = repo.create(&info).await.unwrap();
        assert_eq!(id, 1);

        let mut result = ExecuteResult::not_run(info, "denied");
        result.execute_id = id;
        repo.record_result(&result).await.unwrap();
        assert!(repo.get(id).unwrap().1.is_some());

        result.execute_id = 42;
        assert!(repo.record_result(&result).await.is_err());
    }
}
