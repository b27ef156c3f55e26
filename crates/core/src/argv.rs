// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Argc/argv packing for the blessed EDT's input datablock.
//!
//! Layout: `[total_size:u64][argc:u64][offsets:u64 × argc][strings]`,
//! little-endian words, NUL-terminated strings, offsets relative to the
//! start of the block.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgvError {
    #[error("argv block truncated at {0} bytes")]
    Truncated(usize),
    #[error("argument index {index} out of range (argc {argc})")]
    OutOfRange { index: u64, argc: u64 },
    #[error("argument {0} is not valid utf-8")]
    NotUtf8(u64),
}

/// Pack program arguments into the argv datablock layout.
pub fn pack_args(args: &[String]) -> Vec<u8> {
    let argc = args.len() as u64;
    let header_words = 2 + args.len();
    let strings_len: usize = args.iter().map(|a| a.len() + 1).sum();
    let total = header_words * 8 + strings_len;

    let mut block = Vec::with_capacity(total);
    block.extend_from_slice(&(total as u64).to_le_bytes());
    block.extend_from_slice(&argc.to_le_bytes());

    let mut offset = (header_words * 8) as u64;
    for arg in args {
        block.extend_from_slice(&offset.to_le_bytes());
        offset += arg.len() as u64 + 1;
    }
    for arg in args {
        block.extend_from_slice(arg.as_bytes());
        block.push(0);
    }
    block
}

fn read_word(block: &[u8], word: usize) -> Result<u64, ArgvError> {
    let start = word * 8;
    let bytes: [u8; 8] = block
        .get(start..start + 8)
        .and_then(|s| s.try_into().ok())
        .ok_or(ArgvError::Truncated(block.len()))?;
    Ok(u64::from_le_bytes(bytes))
}

/// Number of packed arguments.
pub fn arg_count(block: &[u8]) -> Result<u64, ArgvError> {
    read_word(block, 1)
}

/// Decode argument `index` as a string slice.
pub fn arg_at(block: &[u8], index: u64) -> Result<&str, ArgvError> {
    let argc = arg_count(block)?;
    if index >= argc {
        return Err(ArgvError::OutOfRange { index, argc });
    }
    let offset = read_word(block, 2 + index as usize)? as usize;
    let tail = block.get(offset..).ok_or(ArgvError::Truncated(block.len()))?;
    let end = tail.iter().position(|&b| b == 0).ok_or(ArgvError::Truncated(block.len()))?;
    std::str::from_utf8(&tail[..end]).map_err(|_| ArgvError::NotUtf8(index))
}

#[cfg(test)]
#[path = "argv_tests.rs"]
mod tests;
