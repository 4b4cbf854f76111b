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

//! Master process wiring.

use std::sync::Arc;

use cronwheel_base::KeyLayout;
use cronwheel_coordinator::KvEngine;
use cronwheel_lock::LockRegistry;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::{
    ClientRegistry, ExecutionRepository, JobRepository, MasterConfig, MemExecutionRepository,
    MemJobRepository, Result,
    api,
    event_plane::{PlanePrefix, run_event_plane},
    server::{ServiceHandler, start_rest_server},
};

/// Shared state behind every API handler and the stream endpoint.
pub struct MasterState {
    pub config:     MasterConfig,
    pub layout:     KeyLayout,
    pub engine:     Arc<dyn KvEngine>,
    pub jobs:       Arc<dyn JobRepository>,
    pub executions: Arc<dyn ExecutionRepository>,
    pub locks:      Arc<LockRegistry>,
    pub registry:   Arc<ClientRegistry>,
}

/// The assembled master process.
pub struct Master {
    config:     MasterConfig,
    engine:     Arc<dyn KvEngine>,
    jobs:       Arc<dyn JobRepository>,
    executions: Arc<dyn ExecutionRepository>,
}

impl Master {
    /// Build a master over the given coordinator engine with in-memory
    /// repositories.
    #[must_use]
    pub fn new(config: MasterConfig, engine: Arc<dyn KvEngine>) -> Self {
        Self {
            config,
            engine,
            jobs: Arc::new(MemJobRepository::new()),
            executions: Arc::new(MemExecutionRepository::new()),
        }
    }

    /// Swap in durable repositories.
    #[must_use]
    pub fn with_repositories(
        mut self,
        jobs: Arc<dyn JobRepository>,
        executions: Arc<dyn ExecutionRepository>,
    ) -> Self {
        self.jobs = jobs;
        self.executions = executions;
        self
    }

    /// Start the HTTP server and both event planes.
    pub async fn start(self) -> Result<MasterHandle> {
        let layout = self.config.layout.clone();
        let registry = ClientRegistry::new();
        let locks = LockRegistry::new(self.engine.clone(), layout.clone(), self.config.lock);

        let state = Arc::new(MasterState {
            config:     self.config.clone(),
            layout:     layout.clone(),
            engine:     self.engine.clone(),
            jobs:       self.jobs,
            executions: self.executions,
            locks,
            registry:   registry.clone(),
        });

        let server = start_rest_server(
            &self.config.bind_address,
            self.config.enable_cors,
            api::router(state.clone()),
        )
        .await?;

        let planes = vec![
            tokio::spawn(run_event_plane(
                self.engine.clone(),
                layout.clone(),
                registry.clone(),
                PlanePrefix::Jobs,
            )),
            tokio::spawn(run_event_plane(
                self.engine,
                layout,
                registry,
                PlanePrefix::Kill,
            )),
        ];

        info!(addr = %server.local_addr(), "master started");
        Ok(MasterHandle {
            server,
            planes,
            state,
        })
    }
}

/// Control surface of a running master.
pub struct MasterHandle {
    server: ServiceHandler,
    planes: Vec<JoinHandle<Result<()>>>,
    state:  Arc<MasterState>,
}

impl MasterHandle {
    #[must_use]
    pub fn state(&self) -> &Arc<MasterState> { &self.state }

    #[must_use]
    pub fn local_addr(&self) -> std::net::SocketAddr { self.server.local_addr() }

    pub async fn wait_for_start(&mut self) { self.server.wait_for_start().await; }

    pub fn shutdown(&self) { self.server.shutdown(); }

    /// Token that stops the server when cancelled; for signal handlers.
    #[must_use]
    pub fn shutdown_token(&self) -> tokio_util::sync::CancellationToken {
        self.server.cancellation_token()
    }

    /// Run until a watch dies or shutdown is requested.
    ///
    /// A dead watch is not recovered: the error propagates so process
    /// supervision restarts the whole master with a fresh snapshot.
    pub async fn run_until_stopped(mut self) -> Result<()> {
        let mut planes = std::mem::take(&mut self.planes);
        let outcome = tokio::select! {
            outcome = futures::future::select_all(&mut planes) => {
                let (result, _, _) = outcome;
                match result {
                    Ok(Err(error)) => {
                        error!(%error, "event plane failed, master terminating");
                        Err(error)
                    }
                    Ok(Ok(())) => Ok(()),
                    Err(join_error) => {
                        error!(%join_error, "event plane panicked, master terminating");
                        Ok(())
                    }
                }
            }
            () = wait_for_shutdown(&self.server) => Ok(()),
        };
        for plane in planes {
            plane.abort();
        }
        self.server.shutdown();
        self.server.wait_for_stop().await;
        outcome
    }
}

async fn wait_for_shutdown(server: &ServiceHandler) {
    // The server task ends only after its cancellation token fires.
    while !server.is_finished() {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}
