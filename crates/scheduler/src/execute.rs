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

use std::sync::{Arc, Mutex};

use cronwheel_model::{ExecStatus, ExecuteInfo};
use tokio_util::sync::CancellationToken;

/// Runtime handle of one in-flight execution.
///
/// The scheduler keeps a clone in its execution table; the executor and
/// its observers hold the others. The status is recorded *before* the
/// token is cancelled so the result emitted afterwards carries the
/// reason for the cancellation, and the first recorded reason wins.
#[derive(Clone)]
pub struct Execution {
    pub info: ExecuteInfo,
    cancel:   CancellationToken,
    status:   Arc<Mutex<ExecStatus>>,
}

impl Execution {
    #[must_use]
    pub fn new(info: ExecuteInfo) -> Self {
        Self {
            info,
            cancel: CancellationToken::new(),
            status: Arc::new(Mutex::new(ExecStatus::Start)),
        }
    }

    /// Record `status` as the cancellation reason and cancel. No-op on
    /// an execution that was already cancelled for another reason.
    pub fn cancel_with(&self, status: ExecStatus) {
        {
            let mut current = self.status.lock().unwrap();
            if *current != ExecStatus::Start {
                return;
            }
            *current = status;
        }
        self.cancel.cancel();
    }

    /// Record the terminal status of a run that completed on its own.
    /// Loses against a previously recorded kill or timeout.
    pub fn finish_with(&self, status: ExecStatus) -> ExecStatus {
        let mut current = self.status.lock().unwrap();
        if *current == ExecStatus::Start {
            *current = status;
        }
        *current
    }

    #[must_use]
    pub fn status(&self) -> ExecStatus { *self.status.lock().unwrap() }

    /// The token the child process runs under.
    #[must_use]
    pub fn token(&self) -> CancellationToken { self.cancel.clone() }
}
