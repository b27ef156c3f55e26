// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message envelope.
//!
//! One envelope serves both directions: a handler answers a request by
//! mutating it in place with [`PolicyMessage::into_response`], which
//! flips the direction, swaps the endpoints, and keeps the rendezvous
//! `msg_id`. The originator owns the envelope; a transport that must
//! keep it past the send call copies the encoded frame.

use crate::body::MessageBody;
use ocr_core::{detail_of, Location, RuntimeError};
use serde::{Deserialize, Serialize};

/// Request/response bit of the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Request,
    Response,
}

/// Identifies an EDT function in the process-wide registry.
///
/// Function pointers cannot travel between policy domains; templates
/// carry this id instead and each domain resolves it locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FnId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub direction: Direction,
    pub src: Location,
    pub dest: Location,
    /// Rendezvous tag pairing a response with its request.
    pub msg_id: u64,
    /// Request bit: the sender expects exactly one response.
    #[serde(default)]
    pub requires_response: bool,
    /// Encoded body length, filled in by the codec.
    #[serde(default)]
    pub useful_size: u64,
    /// Full frame length, filled in by the codec.
    #[serde(default)]
    pub buffer_size: u64,
    /// Status byte of the handled operation; zero is success.
    #[serde(default)]
    pub return_detail: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyMessage {
    pub header: MessageHeader,
    pub body: MessageBody,
}

impl PolicyMessage {
    pub fn request(src: Location, dest: Location, msg_id: u64, body: MessageBody) -> Self {
        Self {
            header: MessageHeader {
                direction: Direction::Request,
                src,
                dest,
                msg_id,
                requires_response: false,
                useful_size: 0,
                buffer_size: 0,
                return_detail: 0,
            },
            body,
        }
    }

    /// Build a response envelope from scratch, for answers to requests
    /// whose envelope was parked earlier (stored-tag responses).
    pub fn response(
        src: Location,
        dest: Location,
        msg_id: u64,
        body: MessageBody,
        status: &Result<(), RuntimeError>,
    ) -> Self {
        Self {
            header: MessageHeader {
                direction: Direction::Response,
                src,
                dest,
                msg_id,
                requires_response: false,
                useful_size: 0,
                buffer_size: 0,
                return_detail: detail_of(status),
            },
            body,
        }
    }

    pub fn is_request(&self) -> bool {
        self.header.direction == Direction::Request
    }

    pub fn is_response(&self) -> bool {
        self.header.direction == Direction::Response
    }

    /// Turn this request into its own response: flip direction, swap
    /// endpoints, record the handler's status. Body mutation (filling O
    /// fields) is the handler's business and has already happened.
    pub fn into_response(&mut self, result: &Result<(), RuntimeError>) {
        debug_assert!(self.is_request());
        self.header.direction = Direction::Response;
        std::mem::swap(&mut self.header.src, &mut self.header.dest);
        self.header.return_detail = detail_of(result);
    }

    /// Status carried by a response envelope.
    pub fn status(&self) -> Result<(), RuntimeError> {
        match RuntimeError::from_code(self.header.return_detail) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
