// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ocr-core: shared vocabulary of the runtime.
//!
//! GUIDs, locations, access modes, the status-code taxonomy, sparse
//! hints, event creation parameters, and the argv datablock layout.
//! Everything here is plain data shared by every other crate.

pub mod argv;
pub mod error;
pub mod guid;
pub mod hint;
pub mod location;
pub mod mode;
pub mod params;
pub mod runlevel;

pub use argv::{arg_at, arg_count, pack_args, ArgvError};
pub use error::{detail_of, RuntimeError};
pub use guid::{Guid, GuidKind, NULL_GUID};
pub use hint::{HintKey, Hints};
pub use location::{Location, INVALID_LOCATION};
pub use mode::{AccessMode, DbState};
pub use params::{
    ChannelParams, CollectiveParams, CountedParams, EventKind, EventParams, LatchParams,
};
pub use runlevel::{RlDirection, Runlevel, UserPhase};
