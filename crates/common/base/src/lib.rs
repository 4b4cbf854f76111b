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

//! Shared building blocks: the coordinator key layout and the handful of
//! identifiers both the master and the workers have to agree on.

mod keys;

pub use keys::{KeyLayout, plan_key};

/// Lease TTL of kill markers, in seconds. Short on purpose: a marker
/// only needs to outlive one watch round-trip.
pub const KILL_MARKER_TTL_SECS: u64 = 5;
