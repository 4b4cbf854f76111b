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

//! Command execution under a distributed lock.
//!
//! For every admitted execution the executor walks one fixed sequence:
//! acquire the job's lock (or report `ran = false`), post the started
//! record, arm the kill-signal observer and the per-job timeout, run the
//! command as a child process under the cancellation token, emit exactly
//! one result, release the lock. Lock denial is the expected outcome of
//! every tick on all workers but one.

use std::{process::Stdio, sync::Arc};

use chrono::Utc;
use cronwheel_base::KeyLayout;
use cronwheel_lock::{HandleState, LockManager};
use cronwheel_model::{Category, ExecStatus, ExecuteResult, OUTPUT_DISCARDED};
use tokio::{io::AsyncReadExt, process::Command, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{Execution, Reporter};

/// Source of category definitions for command wrapping.
pub trait CategoryDirectory: Send + Sync {
    fn get(&self, name: &str) -> Option<Category>;
}

/// Directory that knows no categories; commands run bare.
pub struct NoCategories;

impl CategoryDirectory for NoCategories {
    fn get(&self, _name: &str) -> Option<Category> { None }
}

/// Launch seam between the scheduler and the execution machinery.
///
/// Launch is fire-and-forget: the executor owns its task and its lock
/// handle, and eventually sends exactly one result into `results` — a
/// full inbox blocks the send with the lock still held, on purpose.
pub trait Executor: Send + Sync {
    fn launch(&self, execution: Execution, results: mpsc::Sender<ExecuteResult>);
}

/// The production executor: shell commands under coordinator locks.
pub struct ShellExecutor {
    locks:      Arc<dyn LockManager>,
    reporter:   Arc<dyn Reporter>,
    categories: Arc<dyn CategoryDirectory>,
}

impl ShellExecutor {
    #[must_use]
    pub fn new(
        locks: Arc<dyn LockManager>,
        reporter: Arc<dyn Reporter>,
        categories: Arc<dyn CategoryDirectory>,
    ) -> Self {
        Self {
            locks,
            reporter,
            categories,
        }
    }
}

impl Executor for ShellExecutor {
    fn launch(&self, execution: Execution, results: mpsc::Sender<ExecuteResult>) {
        let locks = self.locks.clone();
        let reporter = self.reporter.clone();
        let categories = self.categories.clone();
        tokio::spawn(run(locks, reporter, categories, execution, results));
    }
}

async fn run(
    locks: Arc<dyn LockManager>,
    reporter: Arc<dyn Reporter>,
    categories: Arc<dyn CategoryDirectory>,
    execution: Execution,
    results: mpsc::Sender<ExecuteResult>,
) {
    let job = execution.info.job.clone();
    let lock_name = KeyLayout::job_lock_name(&job.category, job.id);

    let handle = match locks.try_acquire(&lock_name).await {
        Ok(handle) => handle,
        Err(error) => {
            debug!(job = job.id, %error, "lock denied, skipping run");
            let _ = results
                .send(ExecuteResult::not_run(execution.info.clone(), error.to_string()))
                .await;
            return;
        }
    };

    let mut info = execution.info.clone();
    match reporter.execution_started(&info).await {
        Ok(execute_id) => info.execute_id = execute_id,
        Err(error) => {
            // No record upstream means no durable trace of this run;
            // abort before shell-out rather than execute unaudited.
            warn!(job = job.id, %error, "started record rejected, aborting run");
            handle.release().await;
            let _ = results
                .send(ExecuteResult::not_run(info, format!("reporting failed: {error}")))
                .await;
            return;
        }
    }

    // Lease loss cancels the command with status kill; a voluntary
    // release resolves the observer without cancelling anything.
    let kill_signal = handle.kill_signal();
    let kill_observer = execution.clone();
    tokio::spawn(async move {
        if kill_signal.wait().await == HandleState::NeedsKill {
            kill_observer.cancel_with(ExecStatus::Kill);
        }
    });

    // Per-job timeout. The guard resolves the timer task once the
    // command is done, whichever way it ended.
    let finished = CancellationToken::new();
    let _finished_guard = finished.clone().drop_guard();
    if let Some(timeout) = job.timeout_duration() {
        let deadline_execution = execution.clone();
        let finished = finished.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(timeout) => {
                    deadline_execution.cancel_with(ExecStatus::Timeout);
                }
                () = finished.cancelled() => {}
            }
        });
    }

    let command = match categories.get(&job.category) {
        Some(category) => category.wrap_command(&job.command),
        None => job.command.clone(),
    };

    let started_at = Utc::now();
    info.started_at = Some(started_at);
    let (output, error, success) = run_command(&command, job.save_output, execution.token()).await;

    let status = execution.finish_with(if success { ExecStatus::Done } else { ExecStatus::Error });
    let result = ExecuteResult {
        execute_id: info.execute_id,
        info,
        ran: true,
        output,
        error,
        started_at: Some(started_at),
        finished_at: Utc::now(),
        status,
    };

    // Emit before releasing: the lock stays held until the result is
    // accepted downstream.
    let _ = results.send(result).await;
    handle.release().await;
}

/// Run `sh -c <command>` under the token. Returns (output, error,
/// success).
async fn run_command(
    command: &str,
    save_output: bool,
    token: CancellationToken,
) -> (String, Option<String>, bool) {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd.stdin(Stdio::null());
    if save_output {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    } else {
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
    }
    cmd.kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(error) => {
            return (
                OUTPUT_DISCARDED.to_string(),
                Some(format!("failed to spawn command: {error}")),
                false,
            );
        }
    };

    // Both pipes are drained concurrently; reading them one after the
    // other can deadlock a child that fills the second pipe first.
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let reader = tokio::spawn(async move {
        let out = async {
            let mut buf = Vec::new();
            if let Some(mut stdout) = stdout {
                let _ = stdout.read_to_end(&mut buf).await;
            }
            buf
        };
        let err = async {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut buf).await;
            }
            buf
        };
        let (mut out, err) = tokio::join!(out, err);
        out.extend_from_slice(&err);
        out
    });

    let wait_result = tokio::select! {
        status = child.wait() => status,
        () = token.cancelled() => {
            if let Err(error) = child.start_kill() {
                warn!(%error, "failed to kill cancelled command");
            }
            child.wait().await
        }
    };

    let output = if save_output {
        String::from_utf8_lossy(&reader.await.unwrap_or_default()).into_owned()
    } else {
        reader.abort();
        OUTPUT_DISCARDED.to_string()
    };

    match wait_result {
        Ok(status) if status.success() => (output, None, true),
        Ok(status) => (output, Some(format!("command exited with {status}")), false),
        Err(error) => (output, Some(format!("failed to wait for command: {error}")), false),
    }
}
