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

//! Proxied lock flavor: the master owns the lease.
//!
//! The worker only ever talks HTTP. Acquisition goes through
//! `POST /api/v1/lock/create`, renewals through `POST /api/v1/lock/lease`
//! at the same cadence the in-process flavor keeps, and release through
//! `DELETE /api/v1/lock/release/:lease_id`. The master validates the
//! secret, forwards keep-alives to the coordinator, and force-kills the
//! lock when renewals stop arriving (see
//! [`LockRegistry`](crate::LockRegistry)).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use tokio::sync::{mpsc, watch};
use tracing::warn;

use crate::{
    LockConfig, LockManager,
    error::{AlreadyHeldSnafu, RejectedSnafu, RequestSnafu, Result},
    handle::{HandleState, LockHandle},
    metrics::{FLAVOR_PROXY, LOCK_ACQUIRED, LOCK_CONTENDED},
    renewal::{Renewer, renewal_loop},
};

/// Body of a successful `POST /api/v1/lock/create`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LockCreated {
    pub name:      String,
    pub ttl:       u64,
    pub password:  String,
    pub lease_id:  i64,
    pub is_active: bool,
}

/// Body of the lease and release endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LockOpStatus {
    pub status:  String,
    #[serde(default)]
    pub message: String,
}

impl LockOpStatus {
    pub const SUCCESS: &'static str = "success";
    pub const ERROR: &'static str = "error";

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status:  Self::SUCCESS.to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status:  Self::ERROR.to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool { self.status == Self::SUCCESS }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Lock manager that proxies everything through the master.
#[derive(Clone)]
pub struct ProxyLockManager {
    client:   reqwest::Client,
    base_url: String,
    config:   LockConfig,
}

impl ProxyLockManager {
    /// `base_url` is the master's HTTP root, e.g. `http://master:8220`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, config: LockConfig) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
            config,
        }
    }
}

#[async_trait]
impl LockManager for ProxyLockManager {
    async fn try_acquire(&self, name: &str) -> Result<LockHandle> {
        let response = self
            .client
            .post(format!("{}/api/v1/lock/create", self.base_url))
            .form(&[("name", name), ("ttl", &self.config.ttl_secs.to_string())])
            .send()
            .await
            .context(RequestSnafu { name })?;

        if response.status() == StatusCode::BAD_REQUEST {
            let body: ErrorBody = response.json().await.unwrap_or(ErrorBody {
                message: String::new(),
            });
            warn!(lock = name, message = %body.message, "master denied lock");
            LOCK_CONTENDED.with_label_values(&[FLAVOR_PROXY]).inc();
            return AlreadyHeldSnafu { name }.fail();
        }
        if !response.status().is_success() {
            let status = response.status();
            return RejectedSnafu {
                name,
                message: format!("unexpected status {status}"),
            }
            .fail();
        }

        let created: LockCreated = response.json().await.context(RequestSnafu { name })?;
        LOCK_ACQUIRED.with_label_values(&[FLAVOR_PROXY]).inc();

        let (state_tx, state_rx) = watch::channel(HandleState::Held);
        let (release_tx, release_rx) = mpsc::channel(1);
        tokio::spawn(renewal_loop(
            HttpRenewer {
                client:   self.client.clone(),
                base_url: self.base_url.clone(),
                name:     name.to_string(),
                lease:    created.lease_id,
                password: created.password.clone(),
            },
            self.config,
            state_tx,
            release_rx,
        ));

        Ok(LockHandle::new(
            name.to_string(),
            created.lease_id,
            created.password,
            state_rx,
            release_tx,
        ))
    }
}

struct HttpRenewer {
    client:   reqwest::Client,
    base_url: String,
    name:     String,
    lease:    i64,
    password: String,
}

#[async_trait]
impl Renewer for HttpRenewer {
    fn flavor(&self) -> &'static str { FLAVOR_PROXY }

    fn lock_name(&self) -> &str { &self.name }

    async fn renew(&mut self) -> bool {
        let response = self
            .client
            .post(format!("{}/api/v1/lock/lease", self.base_url))
            .form(&[
                ("lease_id", self.lease.to_string()),
                ("password", self.password.clone()),
            ])
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                match response.json::<LockOpStatus>().await {
                    Ok(status) if status.is_success() => true,
                    Ok(status) => {
                        warn!(lock = %self.name, message = %status.message, "master refused renewal");
                        false
                    }
                    Err(error) => {
                        warn!(lock = %self.name, %error, "malformed renewal response");
                        false
                    }
                }
            }
            Ok(response) => {
                warn!(lock = %self.name, status = %response.status(), "renewal rejected");
                false
            }
            Err(error) => {
                warn!(lock = %self.name, %error, "renewal request failed");
                false
            }
        }
    }

    async fn revoke(&mut self) {
        let result = self
            .client
            .delete(format!(
                "{}/api/v1/lock/release/{}",
                self.base_url, self.lease
            ))
            .send()
            .await;
        if let Err(error) = result {
            warn!(lock = %self.name, %error, "lock release request failed, lease will expire");
        }
    }
}
