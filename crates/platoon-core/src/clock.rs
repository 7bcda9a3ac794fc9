// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Causal matrix clock piggy-backed on every inter-node message.
//!
//! Node 0 is always the leader; followers occupy 1..NUM_TRUCKS-1 by their
//! platoon position. Grounded on `matrix_clock.c`: `mc_local_event`,
//! `mc_send_event`, and `mc_receive_event` map onto [`MatrixClock::local_tick`],
//! [`MatrixClock::on_send`], and [`MatrixClock::on_receive`] below.

use serde::{Deserialize, Serialize};

use crate::config::NUM_TRUCKS;

/// An NxN causal vector, one row/column per node (leader at index 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixClock {
    mc: [[i64; NUM_TRUCKS]; NUM_TRUCKS],
}

impl Default for MatrixClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixClock {
    pub fn new() -> Self {
        Self { mc: [[0; NUM_TRUCKS]; NUM_TRUCKS] }
    }

    /// Read the full matrix (row-major, `m[i][j]`).
    pub fn matrix(&self) -> &[[i64; NUM_TRUCKS]; NUM_TRUCKS] {
        &self.mc
    }

    /// A purely local event: increment `M[self][self]`.
    pub fn local_tick(&mut self, self_id: usize) {
        self.mc[self_id][self_id] += 1;
    }

    /// Sending is itself a local event; call before copying the clock into
    /// an outgoing wire message.
    pub fn on_send(&mut self, self_id: usize) {
        self.local_tick(self_id);
    }

    /// Merge an incoming clock elementwise-max, then tick the local cell.
    /// The merge-then-tick order matters: it guarantees the post-state's
    /// `M[self][self]` is strictly greater than the incoming clock's, per
    /// invariant I5.
    pub fn on_receive(&mut self, self_id: usize, incoming: &MatrixClock) {
        for i in 0..NUM_TRUCKS {
            for j in 0..NUM_TRUCKS {
                if incoming.mc[i][j] > self.mc[i][j] {
                    self.mc[i][j] = incoming.mc[i][j];
                }
            }
        }
        self.mc[self_id][self_id] += 1;
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
