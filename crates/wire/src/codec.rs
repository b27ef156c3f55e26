// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame codec: 4-byte big-endian length prefix + JSON payload.
//!
//! Encoding stamps `useful_size` (payload bytes) and `buffer_size`
//! (full frame) into the header so the sizes survive the round trip.

use crate::message::PolicyMessage;
use thiserror::Error;

/// Frames at or under this size ride the fixed-size fast lane and skip
/// the probe round-trip.
pub const FIXED_FRAME_SIZE: usize = 4096;

const LEN_PREFIX: usize = 4;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("frame truncated: have {have} bytes, need {need}")]
    Truncated { have: usize, need: usize },

    #[error("frame length {0} exceeds u32 range")]
    Oversize(usize),

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Encode a message into a length-prefixed frame.
///
/// The size fields live inside the JSON payload, so stamping them can
/// change the payload length; re-encode until the stamp is stable
/// (digit widths only grow, so this converges in a couple of passes).
pub fn encode(msg: &mut PolicyMessage) -> Result<Vec<u8>, WireError> {
    let payload = loop {
        let payload = serde_json::to_vec(&*msg)?;
        let useful = payload.len() as u64;
        let buffer = (payload.len() + LEN_PREFIX) as u64;
        if msg.header.useful_size == useful && msg.header.buffer_size == buffer {
            break payload;
        }
        msg.header.useful_size = useful;
        msg.header.buffer_size = buffer;
    };
    let len = u32::try_from(payload.len()).map_err(|_| WireError::Oversize(payload.len()))?;

    let mut frame = Vec::with_capacity(LEN_PREFIX + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode one length-prefixed frame back into a message.
pub fn decode(frame: &[u8]) -> Result<PolicyMessage, WireError> {
    let prefix: [u8; LEN_PREFIX] = frame
        .get(..LEN_PREFIX)
        .and_then(|s| s.try_into().ok())
        .ok_or(WireError::Truncated { have: frame.len(), need: LEN_PREFIX })?;
    let len = u32::from_be_bytes(prefix) as usize;

    let payload = frame.get(LEN_PREFIX..LEN_PREFIX + len).ok_or(WireError::Truncated {
        have: frame.len(),
        need: LEN_PREFIX + len,
    })?;
    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
