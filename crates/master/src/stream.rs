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

//! The `/websocket` event stream endpoint.
//!
//! Each connection gets a registry slot and a writer task draining its
//! frame queue; the read side unpacks worker messages (`getJobs`, and
//! the stream variants of the proxied lock operations) out of the same
//! length-framed protocol the workers receive. Frame corruption drops
//! the connection — the byte stream is no longer at a boundary — and the
//! worker re-snapshots on reconnect.

use std::sync::Arc;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use cronwheel_coordinator::RangeOptions;
use cronwheel_lock::LockOpStatus;
use cronwheel_model::{Job, JobEvent};
use cronwheel_protocol::{Envelope, LockRequest, MessageCategory, Unpacker};
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::{
    app::MasterState,
    metrics::SNAPSHOTS_SERVED,
    registry::ClientId,
};

pub async fn websocket_handler(
    State(state): State<Arc<MasterState>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: Arc<MasterState>, socket: WebSocket) {
    let (id, mut queue_rx) = state.registry.register(state.config.client_queue_depth);
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(frame) = queue_rx.recv().await {
            if ws_tx.send(Message::Binary(frame)).await.is_err() {
                break;
            }
        }
    });

    let mut unpacker = Unpacker::new();
    'reading: while let Some(message) = ws_rx.next().await {
        let Ok(message) = message else { break };
        match message {
            Message::Binary(data) => {
                unpacker.push(&data);
                loop {
                    match unpacker.next() {
                        Ok(Some(payload)) => {
                            handle_payload(&state, id, &payload).await;
                        }
                        Ok(None) => break,
                        Err(error) => {
                            warn!(client = %id, %error, "frame corruption, dropping stream");
                            break 'reading;
                        }
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.registry.unregister(id);
    writer.abort();
}

async fn handle_payload(state: &Arc<MasterState>, id: ClientId, payload: &[u8]) {
    let envelope = match Envelope::from_payload(payload) {
        Ok(envelope) => envelope,
        Err(error) => {
            warn!(client = %id, %error, "malformed envelope, skipping");
            return;
        }
    };

    match envelope.known_category() {
        Some(MessageCategory::GetJobs) => send_snapshot(state, id).await,
        Some(MessageCategory::TryLock) => {
            let Ok(request) = envelope.decode::<LockRequest>() else {
                warn!(client = %id, "malformed tryLock request");
                return;
            };
            let reply = match state.locks.create(&request.name, None).await {
                Ok(grant) => Envelope::new(MessageCategory::TryLock, &cronwheel_lock::LockCreated {
                    name:      grant.name,
                    ttl:       grant.ttl_secs,
                    password:  grant.password,
                    lease_id:  grant.lease_id,
                    is_active: true,
                }),
                Err(error) => {
                    Envelope::new(MessageCategory::TryLock, &LockOpStatus::error(error.to_string()))
                }
            };
            reply_to(state, id, reply);
        }
        Some(MessageCategory::LeaseLock) => {
            let Ok(request) = envelope.decode::<LockRequest>() else {
                warn!(client = %id, "malformed leaseLock request");
                return;
            };
            let status = match state.locks.renew(request.id, &request.secret).await {
                Ok(()) => LockOpStatus::success("lease extended"),
                Err(error) => LockOpStatus::error(error.to_string()),
            };
            reply_to(state, id, Envelope::new(MessageCategory::LeaseLock, &status));
        }
        Some(MessageCategory::ReleaseLock) => {
            let Ok(request) = envelope.decode::<LockRequest>() else {
                warn!(client = %id, "malformed releaseLock request");
                return;
            };
            let status = match state.locks.release(request.id).await {
                Ok(()) => LockOpStatus::success("released"),
                Err(error) => LockOpStatus::error(error.to_string()),
            };
            reply_to(state, id, Envelope::new(MessageCategory::ReleaseLock, &status));
        }
        Some(MessageCategory::JobEvent) | None => {
            debug!(client = %id, category = %envelope.category, "ignoring unexpected message");
        }
    }
}

fn reply_to(
    state: &Arc<MasterState>,
    id: ClientId,
    envelope: Result<Envelope, cronwheel_protocol::message::MessageError>,
) {
    let frame = envelope.and_then(|envelope| envelope.into_frame());
    match frame {
        Ok(frame) => {
            if !state.registry.send_to(id, frame) {
                debug!(client = %id, "reply dropped, stream gone");
            }
        }
        Err(error) => warn!(client = %id, %error, "failed to encode reply"),
    }
}

/// The initial snapshot: one `jobEvent` PUT per job currently in the
/// mirror, queued to the requesting client only.
async fn send_snapshot(state: &Arc<MasterState>, id: ClientId) {
    let prefix = state.layout.jobs_prefix();
    let snapshot = match state.engine.range(&prefix, RangeOptions::prefix()).await {
        Ok(snapshot) => snapshot,
        Err(error) => {
            warn!(client = %id, %error, "snapshot read failed");
            return;
        }
    };

    SNAPSHOTS_SERVED.inc();
    debug!(client = %id, jobs = snapshot.kvs.len(), "serving snapshot");
    for kv in snapshot.kvs {
        let Ok(job) = serde_json::from_slice::<Job>(&kv.value) else {
            warn!(key = %kv.key, "malformed job in mirror, skipped in snapshot");
            continue;
        };
        let frame = JobEvent::put(job);
        match Envelope::job_event(&frame).and_then(|envelope| envelope.into_frame()) {
            Ok(frame) => {
                if !state.registry.send_to(id, frame) {
                    return;
                }
            }
            Err(error) => warn!(%error, "failed to encode snapshot event"),
        }
    }
}
