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

//! Worker process wiring.

use std::sync::Arc;

use cronwheel_coordinator::{EtcdEngine, KvEngine};
use cronwheel_lock::{CasLockManager, LockManager, ProxyLockManager};
use cronwheel_scheduler::{Scheduler, SchedulerConfig, ShellExecutor};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    CategoryCache, HttpReporter, LockFlavor, Registration, Result, StreamClient, WorkerConfig,
};

/// The assembled worker process.
pub struct WorkerApp {
    config: WorkerConfig,
}

impl WorkerApp {
    #[must_use]
    pub fn new(config: WorkerConfig) -> Self { Self { config } }

    /// Connect to the coordinator and run until a termination signal or
    /// until the event stream gives up for good.
    pub async fn run(self) -> Result<()> {
        let engine: Arc<dyn KvEngine> =
            Arc::new(EtcdEngine::connect(&self.config.coordinator).await?);
        let handle = Self::start(self.config, engine).await?;

        tokio::select! {
            () = shutdown_signal() => info!("termination signal received"),
            () = handle.stream_failed() => error!("event stream gave up, worker terminating"),
        }
        handle.shutdown().await
    }

    /// Start all worker components over an existing engine. Used by the
    /// binary after connecting and by tests with the in-memory engine.
    pub async fn start(config: WorkerConfig, engine: Arc<dyn KvEngine>) -> Result<WorkerHandle> {
        let layout = config.layout.clone();

        let registration = Registration::start(
            engine.clone(),
            layout.clone(),
            &config.name,
            config.registration_ttl(),
        )
        .await?;

        let (categories, categories_task) =
            CategoryCache::start(engine.clone(), layout.clone()).await?;

        let locks: Arc<dyn LockManager> = match config.lock_flavor {
            LockFlavor::Cas => Arc::new(CasLockManager::new(
                engine.clone(),
                layout.clone(),
                config.lock,
            )),
            LockFlavor::Proxy => {
                Arc::new(ProxyLockManager::new(config.master_url.clone(), config.lock))
            }
        };
        let reporter = Arc::new(HttpReporter::new(config.master_url.clone()));

        let scheduler_config = SchedulerConfig {
            worker_name: config.name.clone(),
            ..config.scheduler.clone()
        };
        let executor = Arc::new(ShellExecutor::new(
            locks,
            reporter.clone(),
            Arc::new(categories),
        ));
        let scheduler = Scheduler::new(scheduler_config, executor, reporter).start();

        let stop = CancellationToken::new();
        let stream = StreamClient::new(
            config.websocket_url(),
            scheduler.event_sender(),
            config.reconnect_interval(),
            config.reconnect_attempts,
        );
        let stream_task = tokio::spawn(stream.run(stop.clone()));

        info!(worker = %config.name, master = %config.master_url, "worker started");
        Ok(WorkerHandle {
            stop,
            scheduler,
            registration,
            stream_task,
            categories_task,
        })
    }
}

/// Control surface of a running worker.
pub struct WorkerHandle {
    stop:            CancellationToken,
    scheduler:       cronwheel_scheduler::SchedulerHandle,
    registration:    Registration,
    stream_task:     JoinHandle<Result<()>>,
    categories_task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Resolves when the stream client has terminated, normally only
    /// after exhausting its reconnect attempts.
    pub async fn stream_failed(&self) {
        // Poll the join handle without consuming it; the error itself
        // is collected by `shutdown`.
        loop {
            if self.stream_task.is_finished() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    }

    /// Orderly shutdown: stop the stream, cancel in-flight executions
    /// with status `kill`, drain results for the grace period, drop the
    /// registration. Returns the stream client's terminal error when it
    /// had already given up.
    pub async fn shutdown(self) -> Result<()> {
        self.stop.cancel();
        let stream_result = match self.stream_task.await {
            Ok(result) => result,
            Err(_join_error) => Ok(()),
        };
        self.scheduler.shutdown().await;
        self.registration.deregister().await;
        self.categories_task.abort();
        info!("worker stopped");
        stream_result
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received Ctrl+C signal"); },
        () = terminate => { info!("received terminate signal"); },
    }
}
