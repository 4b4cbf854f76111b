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

/// Errors surfaced by the coordinator adapter.
///
/// Transport failures are retried or escalated by the caller (reconnect
/// with backoff); semantic failures like a vanished lease escalate
/// straight to a forced kill on the lock layer.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("coordinator request failed"))]
    Transport {
        source: etcd_client::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("lease {lease} not found"))]
    LeaseNotFound {
        lease: i64,
        #[snafu(implicit)]
        loc:   snafu::Location,
    },

    #[snafu(display("watch stream on {prefix} closed"))]
    WatchClosed {
        prefix: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
