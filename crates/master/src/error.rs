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

use axum::{Json, response::IntoResponse};
use http::StatusCode;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("{what} not found"))]
    NotFound {
        what: String,
        #[snafu(implicit)]
        loc:  snafu::Location,
    },

    #[snafu(display("invalid {what}: {message}"))]
    InvalidInput {
        what:    String,
        message: String,
        #[snafu(implicit)]
        loc:     snafu::Location,
    },

    #[snafu(display("failed to parse address {addr}"))]
    ParseAddress {
        addr:   String,
        source: std::net::AddrParseError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("failed to bind {addr}"))]
    Bind {
        addr:   String,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(transparent)]
    Coordinator {
        source: cronwheel_coordinator::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(transparent)]
    Lock {
        source: cronwheel_lock::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("watch on {prefix} ended"))]
    WatchEnded {
        prefix: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

impl Error {
    /// The HTTP status an API handler answers with.
    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Self::Lock { source, .. } => match source {
                cronwheel_lock::Error::AlreadyHeld { .. }
                | cronwheel_lock::Error::InvalidSecret { .. }
                | cronwheel_lock::Error::UnknownLease { .. } => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.http_status();
        let body = Json(serde_json::json!({ "message": self.to_string() }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
