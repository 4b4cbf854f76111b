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

//! HTTP reporter: execution records posted to the master.

use async_trait::async_trait;
use cronwheel_model::{ExecuteInfo, ExecuteResult};
use cronwheel_scheduler::{Reporter, error::ReportingSnafu};
use serde::Deserialize;

/// Reporter over the master's execution endpoints.
pub struct HttpReporter {
    client:   reqwest::Client,
    base_url: String,
}

impl HttpReporter {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExecutionCreated {
    execute_id: i64,
}

#[async_trait]
impl Reporter for HttpReporter {
    async fn execution_started(&self, info: &ExecuteInfo) -> cronwheel_scheduler::Result<i64> {
        let job = info.job.id;
        let response = self
            .client
            .post(format!("{}/api/v1/job/execute/create", self.base_url))
            .json(info)
            .send()
            .await
            .map_err(|error| {
                ReportingSnafu {
                    job,
                    message: error.to_string(),
                }
                .build()
            })?;
        if !response.status().is_success() {
            return ReportingSnafu {
                job,
                message: format!("master answered {}", response.status()),
            }
            .fail();
        }
        let created: ExecutionCreated = response.json().await.map_err(|error| {
            ReportingSnafu {
                job,
                message: error.to_string(),
            }
            .build()
        })?;
        Ok(created.execute_id)
    }

    async fn execution_finished(&self, result: &ExecuteResult) -> cronwheel_scheduler::Result<()> {
        let job = result.info.job.id;
        let response = self
            .client
            .post(format!("{}/api/v1/job/execute/result/create", self.base_url))
            .json(result)
            .send()
            .await
            .map_err(|error| {
                ReportingSnafu {
                    job,
                    message: error.to_string(),
                }
                .build()
            })?;
        if !response.status().is_success() {
            return ReportingSnafu {
                job,
                message: format!("master answered {}", response.status()),
            }
            .fail();
        }
        Ok(())
    }
}
