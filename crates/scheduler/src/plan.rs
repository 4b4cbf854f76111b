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

use std::str::FromStr;

use chrono::{DateTime, Utc};
use croner::Cron;
use snafu::{OptionExt, ResultExt};

use crate::error::{InvalidExpressionSnafu, NoUpcomingFireSnafu, Result};

/// One job's schedule on this worker: the parsed cron expression and the
/// absolute next fire time.
///
/// The next fire is strictly in the future relative to the instant it
/// was computed from, and is recomputed after every fire.
#[derive(Clone, Debug)]
pub struct SchedulePlan {
    pub job:       cronwheel_model::Job,
    cron:          Cron,
    pub next_fire: DateTime<Utc>,
}

impl SchedulePlan {
    /// Parse the job's expression and compute the first fire after
    /// `now`. Standard 5-field cron; a leading seconds field is
    /// accepted.
    pub fn new(job: cronwheel_model::Job, now: DateTime<Utc>) -> Result<Self> {
        let cron = Cron::from_str(&job.time).context(InvalidExpressionSnafu {
            expression: job.time.clone(),
        })?;
        let next_fire = cron
            .find_next_occurrence(&now, false)
            .ok()
            .context(NoUpcomingFireSnafu {
                expression: job.time.clone(),
            })?;
        Ok(Self {
            job,
            cron,
            next_fire,
        })
    }

    /// Whether the plan is due at `now`.
    #[must_use]
    pub fn due(&self, now: DateTime<Utc>) -> bool { self.next_fire <= now }

    /// Advance past `now`. Fails only for expressions with no further
    /// occurrence, in which case the caller retires the plan.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.next_fire = self
            .cron
            .find_next_occurrence(&now, false)
            .ok()
            .context(NoUpcomingFireSnafu {
                expression: self.job.time.clone(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn job(expression: &str) -> cronwheel_model::Job {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "category": "default",
            "name": "j",
            "time": expression,
            "command": "true",
            "is_active": true,
            "save_output": false,
        }))
        .unwrap()
    }

    #[test]
    fn five_field_expressions_parse() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 30).unwrap();
        let plan = SchedulePlan::new(job("*/5 * * * *"), now).unwrap();
        assert_eq!(plan.next_fire, Utc.with_ymd_and_hms(2025, 6, 1, 12, 5, 0).unwrap());
    }

    #[test]
    fn six_field_expressions_fire_on_seconds() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 2).unwrap();
        let plan = SchedulePlan::new(job("*/5 * * * * *"), now).unwrap();
        assert_eq!(plan.next_fire, Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 5).unwrap());
    }

    #[test]
    fn next_fire_is_strictly_after_the_reference_instant() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 5).unwrap();
        let mut plan = SchedulePlan::new(job("*/5 * * * * *"), now).unwrap();
        assert!(plan.next_fire > now);

        let fired_at = plan.next_fire;
        plan.advance(fired_at).unwrap();
        assert!(plan.next_fire > fired_at);
    }

    #[test]
    fn garbage_expressions_are_rejected() {
        let now = Utc::now();
        assert!(SchedulePlan::new(job("not a cron"), now).is_err());
        assert!(SchedulePlan::new(job("99 * * * *"), now).is_err());
    }
}
