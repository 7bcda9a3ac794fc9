// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Internal error codes for the coordination kernel. Process-boundary
/// failures (bad CLI args, socket setup) are reported as `anyhow::Error`
/// from the binary crates; this enum covers failures the library itself
/// needs to represent and react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatoonError {
    /// A priority ring was at capacity; the push was dropped.
    QueueFull,
    /// A wire message carried a discriminant this build does not know.
    UnknownWireTag,
    /// No free follower slot was available in the topology registry.
    NoFreeSlot,
    /// A socket operation failed in a way that is not a plain disconnect.
    Io,
}

impl PlatoonError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueueFull => "QUEUE_FULL",
            Self::UnknownWireTag => "UNKNOWN_WIRE_TAG",
            Self::NoFreeSlot => "NO_FREE_SLOT",
            Self::Io => "IO",
        }
    }
}

impl fmt::Display for PlatoonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for PlatoonError {}
