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

//! HTTP server lifecycle.

use std::net::SocketAddr;

use axum::Router;
use snafu::ResultExt;
use tokio::{sync::oneshot, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::{BindSnafu, ParseAddressSnafu, Result};

/// Handle for managing a running HTTP service.
///
/// Supports waiting for the listener to accept connections, signalling
/// graceful shutdown, and waiting for the task to finish.
pub struct ServiceHandler {
    join_handle:        JoinHandle<()>,
    cancellation_token: CancellationToken,
    started_rx:         Option<oneshot::Receiver<()>>,
    local_addr:         SocketAddr,
}

impl ServiceHandler {
    /// The address the listener actually bound — relevant when the
    /// configured port was 0.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr { self.local_addr }

    /// Waits for the server to start accepting connections.
    ///
    /// # Panics
    /// Panics if called more than once, as the start signal is consumed.
    pub async fn wait_for_start(&mut self) {
        self.started_rx
            .take()
            .expect("server start signal already consumed")
            .await
            .expect("failed to receive server start signal");
    }

    /// Signals the server to begin graceful shutdown.
    pub fn shutdown(&self) { self.cancellation_token.cancel(); }

    /// Clone of the shutdown token, for wiring external triggers.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken { self.cancellation_token.clone() }

    /// Waits for the server task to finish.
    pub async fn wait_for_stop(self) { let _ = self.join_handle.await; }

    /// Whether the server task has completed.
    #[must_use]
    pub fn is_finished(&self) -> bool { self.join_handle.is_finished() }
}

/// Bind and serve the router, returning a lifecycle handle.
pub async fn start_rest_server(
    bind_address: &str,
    enable_cors: bool,
    mut router: Router,
) -> Result<ServiceHandler> {
    let bind_addr = bind_address
        .parse::<SocketAddr>()
        .context(ParseAddressSnafu { addr: bind_address })?;

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .context(BindSnafu { addr: bind_address })?;
    let local_addr = listener.local_addr().context(BindSnafu { addr: bind_address })?;

    let cancellation_token = CancellationToken::new();
    let (started_tx, started_rx) = oneshot::channel::<()>();
    let cancellation_token_clone = cancellation_token.clone();
    let join_handle = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                info!("HTTP server (on {}) starting", local_addr);
                let _ = started_tx.send(());
                cancellation_token_clone.cancelled().await;
                info!("HTTP server (on {}) received shutdown signal", local_addr);
            })
            .await;
        info!("HTTP server (on {}) task completed: {:?}", local_addr, result);
    });

    Ok(ServiceHandler {
        join_handle,
        cancellation_token,
        started_rx: Some(started_rx),
        local_addr,
    })
}
