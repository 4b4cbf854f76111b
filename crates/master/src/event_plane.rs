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

//! Snapshot-then-watch over the jobs and kill prefixes.
//!
//! Startup seeds every already-connected stream with the current job set
//! at revision R, then watches from R+1 so nothing between the two is
//! missed. Translation rules: a PUT under the jobs prefix is a job PUT,
//! a DELETE a job DELETE; a PUT under the kill prefix is a KILL; a
//! DELETE under the kill prefix is lease expiry doing its job and is
//! ignored. A dead watch is not recovered here — the caller treats it as
//! fatal and lets process supervision restart the master.

use std::sync::Arc;

use cronwheel_base::KeyLayout;
use cronwheel_coordinator::{KvEngine, RangeOptions, WatchEvent, WatchEventKind};
use cronwheel_model::{Job, JobEvent, KillMarker};
use cronwheel_protocol::Envelope;
use tracing::{error, info, warn};

use crate::{
    ClientRegistry, Result,
    error::WatchEndedSnafu,
    metrics::WATCH_EVENTS,
};

/// Which of the two watched prefixes a plane instance serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanePrefix {
    Jobs,
    Kill,
}

impl PlanePrefix {
    fn label(self) -> &'static str {
        match self {
            Self::Jobs => "jobs",
            Self::Kill => "kill",
        }
    }
}

/// Run the watch-and-fan-out loop for one prefix until it fails.
///
/// Returns only on error; the master treats that as fatal.
pub async fn run_event_plane(
    engine: Arc<dyn KvEngine>,
    layout: KeyLayout,
    registry: Arc<ClientRegistry>,
    prefix: PlanePrefix,
) -> Result<()> {
    let path = match prefix {
        PlanePrefix::Jobs => layout.jobs_prefix(),
        PlanePrefix::Kill => layout.kill_prefix(),
    };

    // 1. Snapshot at revision R.
    let snapshot = engine.range(&path, RangeOptions::prefix()).await?;
    info!(prefix = path, revision = snapshot.revision, keys = snapshot.kvs.len(),
        "event plane snapshot");
    if prefix == PlanePrefix::Jobs {
        for kv in &snapshot.kvs {
            if let Some(event) = translate_jobs_put(&kv.value, &kv.key) {
                broadcast(&registry, &event);
            }
        }
    }

    // 2. Watch from R+1 with previous values, so deletes still carry the
    // job they removed.
    let mut watch = engine.watch(&path, snapshot.revision + 1, true).await?;
    while let Some(batch) = watch.recv().await {
        let batch = batch?;
        for event in batch {
            WATCH_EVENTS.with_label_values(&[prefix.label()]).inc();
            let translated = match prefix {
                PlanePrefix::Jobs => translate_jobs_event(&event, &path),
                PlanePrefix::Kill => translate_kill_event(&event, &path),
            };
            if let Some(job_event) = translated {
                broadcast(&registry, &job_event);
            }
        }
    }

    error!(prefix = path, "event plane watch ended");
    WatchEndedSnafu { prefix: path }.fail()
}

fn broadcast(registry: &ClientRegistry, event: &JobEvent) {
    match Envelope::job_event(event).and_then(|envelope| envelope.into_frame()) {
        Ok(frame) => registry.broadcast(&frame),
        Err(error) => warn!(%error, "failed to encode job event"),
    }
}

fn translate_jobs_put(value: &[u8], key: &str) -> Option<JobEvent> {
    match serde_json::from_slice::<Job>(value) {
        Ok(job) => Some(JobEvent::put(job)),
        Err(error) => {
            warn!(key, %error, "malformed job snapshot in mirror, skipping");
            None
        }
    }
}

fn translate_jobs_event(event: &WatchEvent, prefix: &str) -> Option<JobEvent> {
    match event.kind {
        WatchEventKind::Put => translate_jobs_put(&event.kv.value, &event.kv.key),
        WatchEventKind::Delete => {
            // The current kv of a delete is empty; the previous value
            // carries the removed job. Without it, reconstruct enough
            // from the key for the workers to retire the plan.
            if let Some(prev) = &event.prev
                && let Ok(job) = serde_json::from_slice::<Job>(&prev.value)
            {
                return Some(JobEvent::delete(job));
            }
            let (category, id) = KeyLayout::split_category_id(prefix, &event.kv.key)?;
            Some(JobEvent::delete(placeholder_job(category, id)))
        }
    }
}

fn translate_kill_event(event: &WatchEvent, prefix: &str) -> Option<JobEvent> {
    match event.kind {
        WatchEventKind::Put => {
            let (category, id) = match serde_json::from_slice::<KillMarker>(&event.kv.value) {
                Ok(marker) => (marker.category, marker.job_id),
                Err(_) => {
                    let (category, id) = KeyLayout::split_category_id(prefix, &event.kv.key)?;
                    (category.to_string(), id)
                }
            };
            Some(JobEvent::kill(placeholder_job(&category, id)))
        }
        // Kill markers expire by lease; the expiry is not a signal.
        WatchEventKind::Delete => None,
    }
}

/// A job carrying only its identity. Kill and fallback-delete events
/// only need (category, id) on the receiving side.
fn placeholder_job(category: &str, id: i64) -> Job {
    Job {
        id,
        category: category.to_string(),
        name: String::new(),
        time: String::new(),
        command: String::new(),
        is_active: false,
        save_output: false,
        timeout: None,
        description: None,
    }
}

#[cfg(test)]
mod tests {
    use cronwheel_coordinator::KeyValue;
    use cronwheel_model::JobEventKind;

    use super::*;

    fn kv(key: &str, value: &[u8]) -> KeyValue {
        KeyValue {
            key:             key.to_string(),
            value:           value.to_vec(),
            create_revision: 1,
            mod_revision:    1,
            lease:           0,
        }
    }

    #[test]
    fn kill_puts_translate_with_the_marker_identity() {
        let marker = serde_json::to_vec(&KillMarker {
            category: "default".to_string(),
            job_id:   7,
        })
        .unwrap();
        let event = WatchEvent {
            kind: WatchEventKind::Put,
            kv:   kv("/crontab/kill/default/7", &marker),
            prev: None,
        };
        let translated = translate_kill_event(&event, "/crontab/kill/").unwrap();
        assert_eq!(translated.kind, JobEventKind::Kill);
        assert_eq!(translated.job.category, "default");
        assert_eq!(translated.job.id, 7);
    }

    #[test]
    fn kill_deletes_are_ignored() {
        let event = WatchEvent {
            kind: WatchEventKind::Delete,
            kv:   kv("/crontab/kill/default/7", b""),
            prev: None,
        };
        assert!(translate_kill_event(&event, "/crontab/kill/").is_none());
    }

    #[test]
    fn job_deletes_prefer_the_previous_value() {
        let job = placeholder_job("default", 9);
        let raw = serde_json::to_vec(&job).unwrap();
        let event = WatchEvent {
            kind: WatchEventKind::Delete,
            kv:   kv("/crontab/jobs/default/9", b""),
            prev: Some(kv("/crontab/jobs/default/9", &raw)),
        };
        let translated = translate_jobs_event(&event, "/crontab/jobs/").unwrap();
        assert_eq!(translated.kind, JobEventKind::Delete);
        assert_eq!(translated.job.id, 9);
    }

    #[test]
    fn malformed_job_values_are_skipped() {
        let event = WatchEvent {
            kind: WatchEventKind::Put,
            kv:   kv("/crontab/jobs/default/9", b"not json"),
            prev: None,
        };
        assert!(translate_jobs_event(&event, "/crontab/jobs/").is_none());
    }
}
