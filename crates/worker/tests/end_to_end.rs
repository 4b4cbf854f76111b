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

//! Whole-system paths: master and worker talking over real HTTP and
//! WebSocket with the in-memory coordinator underneath. Slow by test
//! standards (cron granularity is one second) but this is the only
//! place the full loop — API write, mirror, watch, stream, plan, lock,
//! shell-out, report — runs end to end.

use std::{sync::Arc, time::Duration};

use cronwheel_coordinator::{KvEngine, MemEngine};
use cronwheel_master::{Master, MasterConfig, MasterHandle, MemExecutionRepository};
use cronwheel_model::{ExecStatus, ExecuteResult, KillMarker};
use cronwheel_worker::{WorkerApp, WorkerConfig, WorkerHandle};

struct Cluster {
    master:     MasterHandle,
    executions: Arc<MemExecutionRepository>,
    url:        String,
    engine:     MemEngine,
}

async fn start_master() -> Cluster {
    let engine = MemEngine::new();
    let executions = Arc::new(MemExecutionRepository::new());
    let shared: Arc<dyn KvEngine> = Arc::new(engine.clone());
    let master = Master::new(
        MasterConfig {
            bind_address: "127.0.0.1:0".to_string(),
            ..MasterConfig::default()
        },
        shared,
    )
    .with_repositories(
        Arc::new(cronwheel_master::MemJobRepository::new()),
        executions.clone(),
    );
    let mut master = master.start().await.unwrap();
    master.wait_for_start().await;
    let url = format!("http://{}", master.local_addr());
    Cluster {
        master,
        executions,
        url,
        engine,
    }
}

async fn start_worker(cluster: &Cluster, name: &str) -> WorkerHandle {
    let config = WorkerConfig {
        name:       name.to_string(),
        master_url: cluster.url.clone(),
        ..WorkerConfig::default()
    };
    WorkerApp::start(config, Arc::new(cluster.engine.clone()))
        .await
        .unwrap()
}

async fn create_job(cluster: &Cluster, body: serde_json::Value) {
    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/job", cluster.url))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success(), "{}", response.status());
}

/// Poll the execution store until `predicate` yields, or time out.
async fn wait_for_result(
    executions: &MemExecutionRepository,
    timeout: Duration,
    predicate: impl Fn(&ExecuteResult) -> bool,
) -> ExecuteResult {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        for id in 1..=executions.len() as i64 {
            if let Some((_, Some(result))) = executions.get(id)
                && predicate(&result)
            {
                return result;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "no matching execution result within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::test]
async fn a_job_fires_and_reports_its_output() {
    let cluster = start_master().await;
    let worker = start_worker(&cluster, "worker-a").await;

    create_job(
        &cluster,
        serde_json::json!({
            "id": 7,
            "category": "default",
            "name": "j",
            "time": "* * * * * *",
            "command": "echo hi",
            "is_active": true,
            "save_output": true,
        }),
    )
    .await;

    let result = wait_for_result(&cluster.executions, Duration::from_secs(8), |result| {
        result.status == ExecStatus::Done
    })
    .await;
    assert!(result.ran);
    assert!(result.execute_id >= 1);
    assert_eq!(result.output, "hi\n");
    assert!(result.error.is_none());
    assert_eq!(result.info.worker, "worker-a");

    worker.shutdown().await.unwrap();
    cluster.master.shutdown();
}

#[tokio::test]
async fn two_workers_share_a_job_without_double_running_it() {
    let cluster = start_master().await;
    let worker_a = start_worker(&cluster, "racer-a").await;
    let worker_b = start_worker(&cluster, "racer-b").await;

    create_job(
        &cluster,
        serde_json::json!({
            "id": 9,
            "category": "default",
            "name": "contended",
            "time": "* * * * * *",
            "command": "sleep 0.2 && echo ran",
            "is_active": true,
            "save_output": true,
        }),
    )
    .await;

    // Let a few ticks pass with both workers racing for the lock.
    tokio::time::sleep(Duration::from_secs(4)).await;
    worker_a.shutdown().await.unwrap();
    worker_b.shutdown().await.unwrap();

    // Every record the master holds comes from a worker that won the
    // lock; no planned occurrence may be recorded twice.
    let count = cluster.executions.len();
    assert!(count >= 1, "at least one tick must have run");
    let mut planned = Vec::new();
    for id in 1..=count as i64 {
        let (info, _) = cluster.executions.get(id).unwrap();
        planned.push(info.planned_at);
    }
    let before = planned.len();
    planned.sort();
    planned.dedup();
    assert_eq!(planned.len(), before, "a planned occurrence ran on both workers");

    cluster.master.shutdown();
}

#[tokio::test]
async fn a_kill_marker_cancels_the_running_command() {
    let cluster = start_master().await;
    let worker = start_worker(&cluster, "worker-k").await;

    create_job(
        &cluster,
        serde_json::json!({
            "id": 11,
            "category": "default",
            "name": "long",
            "time": "* * * * * *",
            "command": "sleep 60",
            "is_active": true,
            "save_output": false,
        }),
    )
    .await;

    // Wait until the started record exists, i.e. the command is running.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while cluster.executions.is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "execution never started");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/job/kill", cluster.url))
        .json(&KillMarker {
            category: "default".to_string(),
            job_id:   11,
        })
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let result = wait_for_result(&cluster.executions, Duration::from_secs(5), |result| {
        result.status == ExecStatus::Kill
    })
    .await;
    assert!(result.ran);
    assert!(result.error.is_some(), "a killed command carries its exit error");

    worker.shutdown().await.unwrap();
    cluster.master.shutdown();
}

#[tokio::test]
async fn a_timed_out_job_reports_timeout() {
    let cluster = start_master().await;
    let worker = start_worker(&cluster, "worker-t").await;

    create_job(
        &cluster,
        serde_json::json!({
            "id": 13,
            "category": "default",
            "name": "slow",
            "time": "* * * * * *",
            "command": "sleep 30",
            "is_active": true,
            "save_output": false,
            "timeout": 1,
        }),
    )
    .await;

    let result = wait_for_result(&cluster.executions, Duration::from_secs(8), |result| {
        result.status == ExecStatus::Timeout
    })
    .await;
    assert!(result.ran);

    worker.shutdown().await.unwrap();
    cluster.master.shutdown();
}
