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

//! Event stream client.
//!
//! Connects to the master's `/websocket`, requests the snapshot with
//! `getJobs`, and pushes every decoded job event into the scheduler's
//! bounded inbox — a full inbox blocks this reader, which is the
//! designed backpressure path. On any stream failure the client
//! reconnects with arithmetic backoff (attempt × base interval) and
//! re-snapshots; after the configured number of consecutive failed
//! attempts it gives up and the process exits for supervision to
//! restart.

use cronwheel_model::JobEvent;
use cronwheel_protocol::{Envelope, MessageCategory, Unpacker};
use futures::{SinkExt, StreamExt};
use snafu::ResultExt;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    Result,
    error::{ConnectionExhaustedSnafu, FrameSnafu, MessageSnafu, StreamClosedSnafu, StreamSnafu},
};

/// The connect-pump-reconnect state machine.
pub struct StreamClient {
    url:                String,
    events:             mpsc::Sender<JobEvent>,
    reconnect_interval: std::time::Duration,
    max_attempts:       u32,
}

enum PumpEnd {
    /// Shutdown was requested; do not reconnect.
    Stopped,
    /// The connection died after having been established.
    Disconnected(crate::Error),
}

impl StreamClient {
    #[must_use]
    pub fn new(
        url: String,
        events: mpsc::Sender<JobEvent>,
        reconnect_interval: std::time::Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            url,
            events,
            reconnect_interval,
            max_attempts,
        }
    }

    /// Run until shutdown or until reconnection attempts are exhausted.
    pub async fn run(self, stop: CancellationToken) -> Result<()> {
        let mut attempts: u32 = 0;
        loop {
            if stop.is_cancelled() {
                return Ok(());
            }

            match self.connect_and_pump(&stop).await {
                Ok(PumpEnd::Stopped) => return Ok(()),
                Ok(PumpEnd::Disconnected(error)) => {
                    // A working connection existed; start counting anew.
                    attempts = 1;
                    warn!(%error, "event stream lost");
                }
                Err(error) => {
                    attempts += 1;
                    warn!(attempt = attempts, %error, "event stream connect failed");
                }
            }

            if attempts >= self.max_attempts {
                return ConnectionExhaustedSnafu {
                    attempts: self.max_attempts,
                }
                .fail();
            }

            let backoff = self.reconnect_interval * attempts.max(1);
            info!(?backoff, "reconnecting to event stream");
            tokio::select! {
                () = stop.cancelled() => return Ok(()),
                () = tokio::time::sleep(backoff) => {}
            }
        }
    }

    async fn connect_and_pump(&self, stop: &CancellationToken) -> Result<PumpEnd> {
        let (socket, _response) = connect_async(&self.url).await.context(StreamSnafu)?;
        info!(url = %self.url, "event stream connected");
        let (mut ws_tx, mut ws_rx) = socket.split();

        // First word on every connection: ask for the snapshot.
        let request = Envelope::get_jobs().into_frame().context(MessageSnafu)?;
        if let Err(error) = ws_tx.send(Message::binary(request)).await {
            return Err(crate::Error::Stream {
                source: error,
                loc:    snafu::location!(),
            });
        }

        let mut unpacker = Unpacker::new();
        loop {
            tokio::select! {
                () = stop.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return Ok(PumpEnd::Stopped);
                }
                message = ws_rx.next() => {
                    let outcome = match message {
                        None => Err(StreamClosedSnafu.build()),
                        Some(Err(source)) => Err(crate::Error::Stream {
                            source,
                            loc: snafu::location!(),
                        }),
                        Some(Ok(Message::Binary(data))) => {
                            self.pump_frames(&mut unpacker, &data).await
                        }
                        Some(Ok(Message::Close(_))) => Err(StreamClosedSnafu.build()),
                        Some(Ok(_)) => Ok(()),
                    };
                    if let Err(error) = outcome {
                        return Ok(PumpEnd::Disconnected(error));
                    }
                }
            }
        }
    }

    async fn pump_frames(&self, unpacker: &mut Unpacker, data: &[u8]) -> Result<()> {
        unpacker.push(data);
        loop {
            let payload = match unpacker.next().context(FrameSnafu)? {
                Some(payload) => payload,
                None => return Ok(()),
            };
            let envelope = Envelope::from_payload(&payload).context(MessageSnafu)?;
            match envelope.known_category() {
                Some(MessageCategory::JobEvent) => {
                    let event: JobEvent = envelope.decode().context(MessageSnafu)?;
                    if self.events.send(event).await.is_err() {
                        // Scheduler gone; treat like a closed stream.
                        return Err(StreamClosedSnafu.build());
                    }
                }
                other => {
                    debug!(category = %envelope.category, known = other.is_some(),
                        "ignoring non-event message");
                }
            }
        }
    }
}
