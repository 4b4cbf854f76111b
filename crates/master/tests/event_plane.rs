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

//! Snapshot-then-watch fan-out through the client registry.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use cronwheel_base::{KILL_MARKER_TTL_SECS, KeyLayout};
use cronwheel_coordinator::{KvEngine, MemEngine, PutOptions};
use cronwheel_master::{ClientRegistry, PlanePrefix, run_event_plane};
use cronwheel_model::{Job, JobEvent, JobEventKind, KillMarker};
use cronwheel_protocol::{Envelope, Unpacker};
use tokio::sync::mpsc;

fn job(id: i64) -> Job {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "category": "default",
        "name": format!("job-{id}"),
        "time": "*/5 * * * * *",
        "command": "echo hi",
        "is_active": true,
        "save_output": true,
    }))
    .unwrap()
}

async fn next_event(rx: &mut mpsc::Receiver<Bytes>) -> JobEvent {
    let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event must arrive")
        .expect("stream open");
    let mut unpacker = Unpacker::new();
    unpacker.push(&frame);
    let payload = unpacker.next().unwrap().expect("one full frame per send");
    let envelope = Envelope::from_payload(&payload).unwrap();
    assert_eq!(envelope.category, "jobEvent");
    envelope.decode().unwrap()
}

#[tokio::test]
async fn puts_kills_and_deletes_reach_connected_streams() {
    let engine = MemEngine::new();
    let layout = KeyLayout::default();
    let registry = ClientRegistry::new();
    let (_id, mut rx) = registry.register(64);

    let shared: Arc<dyn KvEngine> = Arc::new(engine.clone());
    tokio::spawn(run_event_plane(
        shared.clone(),
        layout.clone(),
        registry.clone(),
        PlanePrefix::Jobs,
    ));
    tokio::spawn(run_event_plane(
        shared.clone(),
        layout.clone(),
        registry.clone(),
        PlanePrefix::Kill,
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;

    // PUT on the jobs prefix → job PUT event.
    let put_job = job(7);
    engine
        .put(
            &layout.job_key("default", 7),
            serde_json::to_vec(&put_job).unwrap(),
            PutOptions::default(),
        )
        .await
        .unwrap();
    let event = next_event(&mut rx).await;
    assert_eq!(event.kind, JobEventKind::Put);
    assert_eq!(event.job, put_job);

    // PUT on the kill prefix → KILL event carrying the job identity.
    let marker = KillMarker {
        category: "default".to_string(),
        job_id:   7,
    };
    let lease = engine
        .lease_grant(Duration::from_secs(KILL_MARKER_TTL_SECS))
        .await
        .unwrap();
    engine
        .put(
            &layout.kill_key("default", 7),
            serde_json::to_vec(&marker).unwrap(),
            PutOptions {
                lease:   Some(lease),
                prev_kv: false,
            },
        )
        .await
        .unwrap();
    let event = next_event(&mut rx).await;
    assert_eq!(event.kind, JobEventKind::Kill);
    assert_eq!(event.job.id, 7);
    assert_eq!(event.job.category, "default");

    // DELETE on the jobs prefix → job DELETE event.
    engine.delete(&layout.job_key("default", 7), false).await.unwrap();
    let event = next_event(&mut rx).await;
    assert_eq!(event.kind, JobEventKind::Delete);
    assert_eq!(event.job.id, 7);

    // Nothing else happened; no spurious events may be queued.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn late_joiners_see_existing_jobs_in_the_snapshot_broadcast() {
    let engine = MemEngine::new();
    let layout = KeyLayout::default();
    let registry = ClientRegistry::new();

    let existing = job(3);
    engine
        .put(
            &layout.job_key("default", 3),
            serde_json::to_vec(&existing).unwrap(),
            PutOptions::default(),
        )
        .await
        .unwrap();

    // A client connected before the plane starts receives the startup
    // snapshot as PUT events.
    let (_id, mut rx) = registry.register(64);
    let shared: Arc<dyn KvEngine> = Arc::new(engine.clone());
    tokio::spawn(run_event_plane(
        shared,
        layout.clone(),
        registry.clone(),
        PlanePrefix::Jobs,
    ));

    let event = next_event(&mut rx).await;
    assert_eq!(event.kind, JobEventKind::Put);
    assert_eq!(event.job, existing);
}
