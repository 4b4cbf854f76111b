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

//! Frame packing and incremental unpacking.
//!
//! ## On-wire frame format
//!
//! ```text
//! ┌──────────────────┬─────────────────┬──────────────────────┐
//! │   Magic (18B)    │   Length (4B)   │   Payload (variable) │
//! │   ASCII literal  │   big-endian    │   raw bytes          │
//! └──────────────────┴─────────────────┴──────────────────────┘
//! ```
//!
//! - **Magic**: the 18-byte ASCII literal [`FRAME_MAGIC`]; anything else
//!   at a frame boundary is corruption and the connection is dropped
//! - **Length**: 4-byte big-endian u32 payload size, capped at
//!   [`MAX_PAYLOAD_LEN`]
//! - **Payload**: the frame body, typically a JSON
//!   [`Envelope`](crate::Envelope)
//!
//! Unpacking is stateful: transport reads can split or merge frames
//! arbitrarily, so [`Unpacker`] carries partial bytes across calls.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Literal header starting every frame.
pub const FRAME_MAGIC: &[u8; 18] = b"cronwheel-frame-v1";

/// Maximum declared payload length a receiver accepts.
pub const MAX_PAYLOAD_LEN: usize = 65535;

const LEN_SIZE: usize = 4;
const HEADER_SIZE: usize = FRAME_MAGIC.len() + LEN_SIZE;

/// Errors surfaced while packing or unpacking frames. Any unpack error
/// is terminal for the connection: the byte stream can no longer be
/// trusted to be at a frame boundary.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame header does not match the protocol magic")]
    BadMagic,

    #[error("declared payload length {0} exceeds the {MAX_PAYLOAD_LEN} byte cap")]
    FrameTooLarge(usize),

    #[error("payload of {0} bytes cannot be packed into one frame")]
    PayloadTooLarge(usize),
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Pack one payload into a single frame.
pub fn pack(payload: &[u8]) -> Result<Bytes> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge(payload.len()));
    }
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    buf.put_slice(FRAME_MAGIC);
    buf.put_u32(u32::try_from(payload.len()).expect("payload length fits u32"));
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Incremental frame decoder.
///
/// Feed raw transport bytes with [`push`](Self::push), then drain
/// complete payloads with [`next`](Self::next) until it returns
/// `Ok(None)`. Bytes of an incomplete trailing frame stay buffered for
/// the next push.
#[derive(Debug, Default)]
pub struct Unpacker {
    buf: BytesMut,
}

impl Unpacker {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append raw bytes read from the transport.
    pub fn push(&mut self, bytes: &[u8]) { self.buf.extend_from_slice(bytes); }

    /// Bytes currently buffered, including any partial frame.
    #[must_use]
    pub fn buffered(&self) -> usize { self.buf.len() }

    /// Decode the next complete payload, if one is buffered.
    pub fn next(&mut self) -> Result<Option<Bytes>> {
        if self.buf.len() < HEADER_SIZE {
            // Even a partial header can already prove corruption.
            let have = self.buf.len().min(FRAME_MAGIC.len());
            if self.buf[..have] != FRAME_MAGIC[..have] {
                return Err(FrameError::BadMagic);
            }
            return Ok(None);
        }

        if self.buf[..FRAME_MAGIC.len()] != FRAME_MAGIC[..] {
            return Err(FrameError::BadMagic);
        }

        let len = u32::from_be_bytes(
            self.buf[FRAME_MAGIC.len()..HEADER_SIZE]
                .try_into()
                .expect("length slice is 4 bytes"),
        ) as usize;
        if len > MAX_PAYLOAD_LEN {
            return Err(FrameError::FrameTooLarge(len));
        }

        if self.buf.len() < HEADER_SIZE + len {
            return Ok(None);
        }

        self.buf.advance(HEADER_SIZE);
        Ok(Some(self.buf.split_to(len).freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trips() {
        let mut unpacker = Unpacker::new();
        unpacker.push(&pack(b"hello").unwrap());
        assert_eq!(unpacker.next().unwrap().unwrap(), Bytes::from_static(b"hello"));
        assert!(unpacker.next().unwrap().is_none());
        assert_eq!(unpacker.buffered(), 0);
    }

    #[test]
    fn empty_payload_round_trips() {
        let mut unpacker = Unpacker::new();
        unpacker.push(&pack(b"").unwrap());
        assert_eq!(unpacker.next().unwrap().unwrap(), Bytes::new());
    }

    #[test]
    fn concatenated_frames_yield_the_concatenated_sequence() {
        let mut wire = Vec::new();
        let messages: Vec<&[u8]> = vec![b"one", b"two", b"three"];
        for message in &messages {
            wire.extend_from_slice(&pack(message).unwrap());
        }

        let mut unpacker = Unpacker::new();
        unpacker.push(&wire);
        let mut decoded = Vec::new();
        while let Some(payload) = unpacker.next().unwrap() {
            decoded.push(payload);
        }
        assert_eq!(decoded, messages);
    }

    #[test]
    fn partial_reads_carry_across_pushes() {
        let frame = pack(b"split me").unwrap();
        let mut unpacker = Unpacker::new();

        // Drip the frame in one byte at a time.
        for (i, byte) in frame.iter().enumerate() {
            unpacker.push(std::slice::from_ref(byte));
            let got = unpacker.next().unwrap();
            if i + 1 < frame.len() {
                assert!(got.is_none());
            } else {
                assert_eq!(got.unwrap(), Bytes::from_static(b"split me"));
            }
        }
    }

    #[test]
    fn oversize_declared_length_is_rejected() {
        let mut wire = Vec::new();
        wire.extend_from_slice(FRAME_MAGIC);
        wire.extend_from_slice(&(u32::try_from(MAX_PAYLOAD_LEN).unwrap() + 1).to_be_bytes());

        let mut unpacker = Unpacker::new();
        unpacker.push(&wire);
        assert!(matches!(unpacker.next(), Err(FrameError::FrameTooLarge(_))));
    }

    #[test]
    fn oversize_payload_cannot_be_packed() {
        let payload = vec![0u8; MAX_PAYLOAD_LEN + 1];
        assert!(matches!(pack(&payload), Err(FrameError::PayloadTooLarge(_))));
    }

    #[test]
    fn bad_magic_is_detected_before_the_full_header_arrives() {
        let mut unpacker = Unpacker::new();
        unpacker.push(b"cronwheel-frame-v2");
        assert!(matches!(unpacker.next(), Err(FrameError::BadMagic)));

        let mut unpacker = Unpacker::new();
        unpacker.push(b"garbage");
        assert!(matches!(unpacker.next(), Err(FrameError::BadMagic)));
    }
}
