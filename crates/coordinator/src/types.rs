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

/// Server-assigned lease identifier.
pub type LeaseId = i64;

/// One key-value pair with its revision metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValue {
    pub key:   String,
    pub value: Vec<u8>,

    /// Revision at which the key was created. Immutable for the lifetime
    /// of the key; zero only in synthetic delete-event records.
    pub create_revision: i64,

    /// Revision of the last modification.
    pub mod_revision: i64,

    /// Attached lease, 0 when none.
    pub lease: LeaseId,
}

impl KeyValue {
    /// The value as UTF-8, lossy. Coordinator payloads in this system
    /// are always JSON text.
    #[must_use]
    pub fn value_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }
}

/// Options for a put.
#[derive(Clone, Copy, Debug, Default)]
pub struct PutOptions {
    pub lease:   Option<LeaseId>,
    /// Return the previous key-value pair, if the key existed.
    pub prev_kv: bool,
}

/// Sort order over creation revisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateRevisionOrder {
    Ascending,
    Descending,
}

/// Options for a range read.
#[derive(Clone, Copy, Debug, Default)]
pub struct RangeOptions {
    /// Treat the key as a prefix.
    pub prefix: bool,

    /// Return keys without values.
    pub keys_only: bool,

    /// Sort results by creation revision.
    pub sort: Option<CreateRevisionOrder>,

    /// Cap the number of returned pairs.
    pub limit: Option<usize>,

    /// Only return keys created at or after this revision.
    pub min_create_revision: Option<i64>,
}

impl RangeOptions {
    /// Prefix scan with no further constraints.
    #[must_use]
    pub fn prefix() -> Self {
        Self {
            prefix: true,
            ..Self::default()
        }
    }
}

/// Result of a range read: the store revision the read observed plus the
/// matching pairs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeResult {
    pub revision: i64,
    pub kvs:      Vec<KeyValue>,
}

/// Kind of a watched change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchEventKind {
    Put,
    Delete,
}

/// One watched change. For deletes, `kv` carries the key and the
/// revision of the deletion; the old pair is in `prev` when the watch
/// requested previous values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub kv:   KeyValue,
    pub prev: Option<KeyValue>,
}

/// Result of the compare-and-set acquisition transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CasOutcome {
    /// The key was absent; it now exists with the caller's value and
    /// lease.
    Acquired,

    /// The key already existed. `current` is the holder's pair as read in
    /// the else-branch of the transaction (`None` if it vanished between
    /// the compare and the read).
    Held { current: Option<KeyValue> },
}
