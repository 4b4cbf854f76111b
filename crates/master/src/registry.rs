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

//! Registry of connected worker streams.
//!
//! Fan-out is best-effort and independent per client: events are queued
//! onto each client's bounded channel without blocking, and a client
//! whose queue is full (or whose writer died) is dropped — its worker
//! reconnects and re-snapshots. The mutex only ever guards the map
//! itself; all I/O happens in the per-client writer tasks.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::metrics::{CLIENTS_DROPPED, CONNECTED_CLIENTS, EVENTS_FANNED_OUT};

/// Identifier of one connected stream.
pub type ClientId = Uuid;

/// Shared map of connected clients to their outbound frame queues.
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientId, mpsc::Sender<Bytes>>>,
}

impl ClientRegistry {
    #[must_use]
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// Register a new client; the receiver feeds its writer task.
    pub fn register(&self, queue_depth: usize) -> (ClientId, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(queue_depth);
        let id = Uuid::new_v4();
        self.clients.lock().unwrap().insert(id, tx);
        CONNECTED_CLIENTS.set(self.len() as i64);
        debug!(client = %id, "worker stream registered");
        (id, rx)
    }

    /// Remove a client, e.g. when its socket closed.
    pub fn unregister(&self, id: ClientId) {
        if self.clients.lock().unwrap().remove(&id).is_some() {
            CONNECTED_CLIENTS.set(self.len() as i64);
            debug!(client = %id, "worker stream unregistered");
        }
    }

    /// Queue one frame to every connected client.
    ///
    /// Clients that cannot accept the frame are dropped on the spot;
    /// their workers re-snapshot on reconnect, so no event is lost for
    /// good.
    pub fn broadcast(&self, frame: &Bytes) {
        let mut stale = Vec::new();
        {
            let clients = self.clients.lock().unwrap();
            for (id, tx) in clients.iter() {
                match tx.try_send(frame.clone()) {
                    Ok(()) => EVENTS_FANNED_OUT.inc(),
                    Err(_) => stale.push(*id),
                }
            }
        }
        for id in stale {
            warn!(client = %id, "dropping worker stream that fell behind");
            CLIENTS_DROPPED.inc();
            self.unregister(id);
        }
    }

    /// Queue one frame to a single client. `false` if it is gone or
    /// full.
    pub fn send_to(&self, id: ClientId, frame: Bytes) -> bool {
        let sender = self.clients.lock().unwrap().get(&id).cloned();
        match sender {
            Some(tx) => tx.try_send(frame).is_ok(),
            None => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize { self.clients.lock().unwrap().len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.clients.lock().unwrap().is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_registered_client() {
        let registry = ClientRegistry::new();
        let (_a, mut rx_a) = registry.register(8);
        let (_b, mut rx_b) = registry.register(8);

        registry.broadcast(&Bytes::from_static(b"frame"));
        assert_eq!(rx_a.recv().await.unwrap(), Bytes::from_static(b"frame"));
        assert_eq!(rx_b.recv().await.unwrap(), Bytes::from_static(b"frame"));
    }

    #[tokio::test]
    async fn clients_with_full_queues_are_dropped() {
        let registry = ClientRegistry::new();
        let (id, rx) = registry.register(1);
        // The queue holds one frame; the second broadcast overflows it.
        registry.broadcast(&Bytes::from_static(b"one"));
        registry.broadcast(&Bytes::from_static(b"two"));

        assert_eq!(registry.len(), 0);
        assert!(!registry.send_to(id, Bytes::from_static(b"three")));
        drop(rx);
    }
}
