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

//! The scheduling loop.
//!
//! Single owner of both tables. Each iteration scans due plans, admits
//! executions through the overrun gate, then parks on whichever comes
//! first: the earliest next fire, a job event, an execution result, or
//! shutdown. Ties between due plans resolve in map iteration order; no
//! fairness is promised within one tick.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use cronwheel_base::plan_key;
use cronwheel_model::{ExecStatus, ExecuteInfo, ExecuteResult, JobEvent, JobEventKind};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    Execution, Executor, Reporter, SchedulePlan, SchedulerConfig,
    metrics::{
        EXECUTIONS_ACTIVE, EXECUTIONS_LAUNCHED, EXECUTIONS_OVERRUN_SKIPS, PLAN_PARSE_FAILURES,
        PLANS_ACTIVE, RESULTS_DISCARDED, RESULTS_FINISHED, SCHEDULER_EVENTS,
    },
};

/// Builder for the scheduling loop; [`start`](Self::start) hands back
/// the running handle.
pub struct Scheduler {
    config:   SchedulerConfig,
    executor: Arc<dyn Executor>,
    reporter: Arc<dyn Reporter>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        config: SchedulerConfig,
        executor: Arc<dyn Executor>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            config,
            executor,
            reporter,
        }
    }

    /// Spawn the scheduling loop and the result forwarder.
    #[must_use]
    pub fn start(self) -> SchedulerHandle {
        let (events_tx, events_rx) = mpsc::channel(self.config.event_capacity);
        let (results_tx, results_rx) = mpsc::channel(self.config.result_capacity);
        let (forward_tx, forward_rx) = mpsc::channel(self.config.result_capacity);
        let stop = CancellationToken::new();

        tokio::spawn(forward_results(self.reporter, forward_rx));
        let join = tokio::spawn(run_loop(
            self.config,
            self.executor,
            events_rx,
            results_tx,
            results_rx,
            forward_tx,
            stop.clone(),
        ));

        SchedulerHandle {
            events_tx,
            stop,
            join,
        }
    }
}

/// Control surface of a running scheduler.
pub struct SchedulerHandle {
    events_tx: mpsc::Sender<JobEvent>,
    stop:      CancellationToken,
    join:      JoinHandle<()>,
}

impl SchedulerHandle {
    /// Sender feeding the bounded event inbox. Sends block when the
    /// inbox is full; that backpressure is load-bearing for the stream
    /// reader.
    #[must_use]
    pub fn event_sender(&self) -> mpsc::Sender<JobEvent> { self.events_tx.clone() }

    /// Push one event. `false` once the scheduler has stopped.
    pub async fn push(&self, event: JobEvent) -> bool { self.events_tx.send(event).await.is_ok() }

    /// Flip the stopping flag without waiting.
    pub fn trigger_shutdown(&self) { self.stop.cancel(); }

    /// Stop and wait: in-flight executions are cancelled with status
    /// `kill` and their results drained for the configured grace period.
    pub async fn shutdown(self) {
        self.stop.cancel();
        let _ = self.join.await;
    }
}

#[allow(clippy::too_many_lines)]
async fn run_loop(
    config: SchedulerConfig,
    executor: Arc<dyn Executor>,
    mut events_rx: mpsc::Receiver<JobEvent>,
    results_tx: mpsc::Sender<ExecuteResult>,
    mut results_rx: mpsc::Receiver<ExecuteResult>,
    forward_tx: mpsc::Sender<ExecuteResult>,
    stop: CancellationToken,
) {
    let mut plans: HashMap<String, SchedulePlan> = HashMap::new();
    let mut executions: HashMap<String, Execution> = HashMap::new();

    info!(worker = %config.worker_name, "scheduler started");

    loop {
        let now = Utc::now();
        let mut retired = Vec::new();
        for (key, plan) in &mut plans {
            if !plan.due(now) {
                continue;
            }
            if executions.contains_key(key) {
                // Overrun: the previous invocation is still running.
                EXECUTIONS_OVERRUN_SKIPS.inc();
                debug!(job = plan.job.id, "skipping tick, previous execution still running");
            } else {
                let info = ExecuteInfo {
                    execute_id:   0,
                    job:          plan.job.clone(),
                    planned_at:   plan.next_fire,
                    scheduled_at: now,
                    started_at:   None,
                    worker:       config.worker_name.clone(),
                };
                let execution = Execution::new(info);
                executions.insert(key.clone(), execution.clone());
                EXECUTIONS_LAUNCHED.inc();
                EXECUTIONS_ACTIVE.set(executions.len() as i64);
                executor.launch(execution, results_tx.clone());
            }
            if plan.advance(now).is_err() {
                warn!(job = plan.job.id, expression = %plan.job.time,
                    "no further occurrences, retiring plan");
                retired.push(key.clone());
            }
        }
        for key in &retired {
            plans.remove(key);
        }
        PLANS_ACTIVE.set(plans.len() as i64);

        let sleep_for = plans
            .values()
            .map(|plan| plan.next_fire)
            .min()
            .map_or(config.idle_tick(), |wake| {
                (wake - Utc::now()).to_std().unwrap_or(Duration::ZERO)
            });

        tokio::select! {
            () = stop.cancelled() => break,
            event = events_rx.recv() => {
                let Some(event) = event else { break };
                handle_event(&mut plans, &executions, event);
                // Drain bursts (the connect snapshot) before rescanning.
                while let Ok(event) = events_rx.try_recv() {
                    handle_event(&mut plans, &executions, event);
                }
            }
            result = results_rx.recv() => {
                if let Some(result) = result {
                    handle_result(&mut executions, &forward_tx, result).await;
                }
            }
            () = tokio::time::sleep(sleep_for) => {}
        }
    }

    // Shutdown: cancel everything in flight, then drain for the grace
    // period so results still reach the master.
    info!(in_flight = executions.len(), "scheduler stopping");
    for execution in executions.values() {
        execution.cancel_with(ExecStatus::Kill);
    }
    let deadline = tokio::time::Instant::now() + config.shutdown_grace();
    while !executions.is_empty() {
        match tokio::time::timeout_at(deadline, results_rx.recv()).await {
            Ok(Some(result)) => handle_result(&mut executions, &forward_tx, result).await,
            Ok(None) | Err(_) => break,
        }
    }
    if !executions.is_empty() {
        warn!(remaining = executions.len(), "shutdown grace elapsed with executions pending");
    }
}

fn handle_event(
    plans: &mut HashMap<String, SchedulePlan>,
    executions: &HashMap<String, Execution>,
    event: JobEvent,
) {
    let key = plan_key(&event.job.category, event.job.id);
    let label = match event.kind {
        JobEventKind::Put => "put",
        JobEventKind::Delete => "delete",
        JobEventKind::Kill => "kill",
    };
    SCHEDULER_EVENTS.with_label_values(&[label]).inc();

    match event.kind {
        JobEventKind::Put => {
            if !event.job.is_active {
                // Inactive jobs must never fire; drop any installed plan.
                plans.remove(&key);
                return;
            }
            let job_id = event.job.id;
            match SchedulePlan::new(event.job, Utc::now()) {
                Ok(plan) => {
                    debug!(job = job_id, next_fire = %plan.next_fire, "plan installed");
                    plans.insert(key, plan);
                }
                Err(error) => {
                    PLAN_PARSE_FAILURES.inc();
                    warn!(job = job_id, %error, "unschedulable job skipped");
                    plans.remove(&key);
                }
            }
        }
        JobEventKind::Delete => {
            plans.remove(&key);
        }
        JobEventKind::Kill => {
            if let Some(execution) = executions.get(&key) {
                info!(job = execution.info.job.id, "kill event, cancelling execution");
                execution.cancel_with(ExecStatus::Kill);
            }
            // No execution in flight: nothing to kill.
        }
    }
}

async fn handle_result(
    executions: &mut HashMap<String, Execution>,
    forward_tx: &mpsc::Sender<ExecuteResult>,
    result: ExecuteResult,
) {
    let key = plan_key(&result.info.job.category, result.info.job.id);
    executions.remove(&key);
    EXECUTIONS_ACTIVE.set(executions.len() as i64);

    if result.ran {
        let status = match result.status {
            ExecStatus::Start => "start",
            ExecStatus::Kill => "kill",
            ExecStatus::Timeout => "timeout",
            ExecStatus::Done => "done",
            ExecStatus::Error => "error",
        };
        RESULTS_FINISHED.with_label_values(&[status]).inc();
        let _ = forward_tx.send(result).await;
    } else {
        // Lock denied elsewhere in the cluster; not our run to report.
        RESULTS_DISCARDED.inc();
        debug!(job = result.info.job.id, "discarding result of denied run");
    }
}

async fn forward_results(reporter: Arc<dyn Reporter>, mut forward_rx: mpsc::Receiver<ExecuteResult>) {
    while let Some(result) = forward_rx.recv().await {
        if let Err(error) = reporter.execution_finished(&result).await {
            warn!(execute_id = result.execute_id, %error, "failed to deliver execution result");
        }
    }
}
