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

//! Wire protocol of the master↔worker event stream.
//!
//! Messages travel as length-prefixed frames inside the WebSocket byte
//! stream; the payload of each frame is a JSON [`Envelope`] tagging the
//! message category. See [`frame`] for the exact byte layout.

pub mod frame;
pub mod message;

pub use frame::{FRAME_MAGIC, FrameError, MAX_PAYLOAD_LEN, Unpacker, pack};
pub use message::{Envelope, LockRequest, MessageCategory};
