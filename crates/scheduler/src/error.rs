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
    /// The job's cron expression does not parse. Fatal for that plan
    /// only: the job is skipped and logged, the scheduler keeps running.
    #[snafu(display("failed to parse cron expression {expression:?}"))]
    InvalidExpression {
        expression: String,
        source:     croner::errors::CronError,
        #[snafu(implicit)]
        loc:        snafu::Location,
    },

    /// The expression parses but has no occurrence after `now`.
    #[snafu(display("cron expression {expression:?} has no upcoming occurrence"))]
    NoUpcomingFire {
        expression: String,
        #[snafu(implicit)]
        loc:        snafu::Location,
    },

    /// Posting an execution record to the master failed. The executor
    /// aborts before shell-out: without the record there is no durable
    /// trace of the run.
    #[snafu(display("failed to report execution of job {job}: {message}"))]
    Reporting {
        job:     i64,
        message: String,
        #[snafu(implicit)]
        loc:     snafu::Location,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
