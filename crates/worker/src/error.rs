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

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(transparent)]
    Coordinator {
        source: cronwheel_coordinator::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("event stream failure"))]
    Stream {
        source: tokio_tungstenite::tungstenite::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("event stream closed by the master"))]
    StreamClosed {
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("corrupt frame on the event stream"))]
    Frame {
        source: cronwheel_protocol::FrameError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("malformed message on the event stream"))]
    Message {
        source: cronwheel_protocol::message::MessageError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("gave up reconnecting after {attempts} attempts"))]
    ConnectionExhausted {
        attempts: u32,
        #[snafu(implicit)]
        loc:      snafu::Location,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
