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

//! Shell executor against real child processes and the in-memory
//! coordinator: lock gating, output capture, timeout and kill
//! semantics. Runs on the real clock because child process I/O does.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::Utc;
use cronwheel_base::KeyLayout;
use cronwheel_coordinator::MemEngine;
use cronwheel_lock::{CasLockManager, LockConfig, LockManager};
use cronwheel_model::{ExecStatus, ExecuteInfo, ExecuteResult, Job, OUTPUT_DISCARDED};
use cronwheel_scheduler::{Execution, Executor, NoCategories, Reporter, ShellExecutor};
use tokio::sync::mpsc;

fn job(id: i64, command: &str, save_output: bool, timeout: Option<u64>) -> Job {
    let mut value = serde_json::json!({
        "id": id,
        "category": "default",
        "name": format!("job-{id}"),
        "time": "* * * * * *",
        "command": command,
        "is_active": true,
        "save_output": save_output,
    });
    if let Some(timeout) = timeout {
        value["timeout"] = timeout.into();
    }
    serde_json::from_value(value).unwrap()
}

fn execution(job: Job) -> Execution {
    Execution::new(ExecuteInfo {
        execute_id:   0,
        job,
        planned_at:   Utc::now(),
        scheduled_at: Utc::now(),
        started_at:   None,
        worker:       "test-worker".to_string(),
    })
}

#[derive(Clone, Default)]
struct SequenceReporter {
    next:    Arc<Mutex<i64>>,
    refused: bool,
}

#[async_trait]
impl Reporter for SequenceReporter {
    async fn execution_started(&self, info: &ExecuteInfo) -> cronwheel_scheduler::Result<i64> {
        if self.refused {
            return cronwheel_scheduler::error::ReportingSnafu {
                job:     info.job.id,
                message: "master unreachable".to_string(),
            }
            .fail();
        }
        let mut next = self.next.lock().unwrap();
        *next += 1;
        Ok(*next)
    }

    async fn execution_finished(&self, _result: &ExecuteResult) -> cronwheel_scheduler::Result<()> {
        Ok(())
    }
}

fn shell_executor(engine: &MemEngine, reporter: SequenceReporter) -> ShellExecutor {
    let locks: Arc<dyn LockManager> = Arc::new(CasLockManager::new(
        Arc::new(engine.clone()),
        KeyLayout::default(),
        LockConfig::default(),
    ));
    ShellExecutor::new(locks, Arc::new(reporter), Arc::new(NoCategories))
}

async fn run_one(executor: &ShellExecutor, execution: Execution) -> ExecuteResult {
    let (tx, mut rx) = mpsc::channel(8);
    executor.launch(execution, tx);
    tokio::time::timeout(Duration::from_secs(20), rx.recv())
        .await
        .expect("executor must emit a result")
        .expect("channel open")
}

#[tokio::test]
async fn echo_runs_and_captures_output() {
    let engine = MemEngine::new();
    let executor = shell_executor(&engine, SequenceReporter::default());

    let result = run_one(&executor, execution(job(7, "echo hi", true, None))).await;
    assert!(result.ran);
    assert_eq!(result.execute_id, 1);
    assert_eq!(result.output, "hi\n");
    assert_eq!(result.status, ExecStatus::Done);
    assert!(result.error.is_none());
    assert!(result.started_at.is_some());
}

#[tokio::test]
async fn discarded_output_is_replaced_by_the_placeholder() {
    let engine = MemEngine::new();
    let executor = shell_executor(&engine, SequenceReporter::default());

    let result = run_one(&executor, execution(job(8, "echo hi", false, None))).await;
    assert!(result.ran);
    assert_eq!(result.output, OUTPUT_DISCARDED);
    assert_eq!(result.status, ExecStatus::Done);
}

#[tokio::test]
async fn nonzero_exit_reports_an_error_status() {
    let engine = MemEngine::new();
    let executor = shell_executor(&engine, SequenceReporter::default());

    let result = run_one(&executor, execution(job(9, "exit 3", true, None))).await;
    assert!(result.ran);
    assert_eq!(result.status, ExecStatus::Error);
    assert!(result.error.unwrap().contains("exit"));
}

#[tokio::test]
async fn two_executors_race_for_one_job_and_exactly_one_runs() {
    let engine = MemEngine::new();
    let first = shell_executor(&engine, SequenceReporter::default());
    let second = shell_executor(&engine, SequenceReporter::default());

    let (tx, mut rx) = mpsc::channel(8);
    first.launch(execution(job(7, "sleep 0.4 && echo won", true, None)), tx.clone());
    second.launch(execution(job(7, "sleep 0.4 && echo won", true, None)), tx);

    let a = rx.recv().await.unwrap();
    let b = rx.recv().await.unwrap();
    let (ran, denied) = if a.ran { (a, b) } else { (b, a) };
    assert!(ran.ran);
    assert_eq!(ran.status, ExecStatus::Done);
    assert!(!denied.ran);
    assert!(denied.error.unwrap().contains("already held"));
}

#[tokio::test]
async fn timeout_kills_the_command_and_tags_the_result() {
    let engine = MemEngine::new();
    let executor = shell_executor(&engine, SequenceReporter::default());

    let started = Instant::now();
    let result = run_one(&executor, execution(job(10, "sleep 30", true, Some(1)))).await;
    let elapsed = started.elapsed();

    assert!(result.ran);
    assert_eq!(result.status, ExecStatus::Timeout);
    assert!(result.error.is_some(), "a killed command reports its exit error");
    assert!(elapsed < Duration::from_secs(10), "timeout must cut the run short");
}

#[tokio::test]
async fn cancellation_tags_the_result_as_killed() {
    let engine = MemEngine::new();
    let executor = shell_executor(&engine, SequenceReporter::default());

    let execution = execution(job(11, "sleep 30", true, None));
    let (tx, mut rx) = mpsc::channel(8);
    executor.launch(execution.clone(), tx);

    tokio::time::sleep(Duration::from_millis(400)).await;
    execution.cancel_with(ExecStatus::Kill);

    let result = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("kill must end the run promptly")
        .unwrap();
    assert!(result.ran);
    assert_eq!(result.status, ExecStatus::Kill);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn reporting_failure_aborts_before_shellout_and_frees_the_lock() {
    let engine = MemEngine::new();
    let refusing = shell_executor(&engine, SequenceReporter {
        refused: true,
        ..SequenceReporter::default()
    });

    let result = run_one(&refusing, execution(job(12, "echo never", true, None))).await;
    assert!(!result.ran);
    assert!(result.error.unwrap().contains("reporting failed"));

    // The lock must have been released; a healthy executor can run the
    // job right away.
    let healthy = shell_executor(&engine, SequenceReporter::default());
    let result = run_one(&healthy, execution(job(12, "echo now", true, None))).await;
    assert!(result.ran);
    assert_eq!(result.status, ExecStatus::Done);
}
