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
    /// Expected contention: somebody else holds the lock. Surfaced to
    /// the caller as `ran = false`, never retried here.
    #[snafu(display("lock {name} is already held"))]
    AlreadyHeld {
        name: String,
        #[snafu(implicit)]
        loc:  snafu::Location,
    },

    /// A renewal or release presented a secret that does not match the
    /// one recorded at acquisition.
    #[snafu(display("invalid secret for lock {name}"))]
    InvalidSecret {
        name: String,
        #[snafu(implicit)]
        loc:  snafu::Location,
    },

    /// No lock is registered under this lease id.
    #[snafu(display("no registered lock for lease {lease}"))]
    UnknownLease {
        lease: i64,
        #[snafu(implicit)]
        loc:   snafu::Location,
    },

    #[snafu(display("coordinator operation failed for lock {name}"))]
    Coordinator {
        name:   String,
        source: cronwheel_coordinator::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// Proxied flavor: the HTTP round-trip to the master failed.
    #[snafu(display("lock request to master failed for {name}"))]
    Request {
        name:   String,
        source: reqwest::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// Proxied flavor: the master answered with an error status.
    #[snafu(display("master rejected lock operation on {name}: {message}"))]
    Rejected {
        name:    String,
        message: String,
        #[snafu(implicit)]
        loc:     snafu::Location,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
