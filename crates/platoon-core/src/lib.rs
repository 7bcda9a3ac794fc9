// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared mechanism for the truck platoon coordination kernel: the matrix
//! clock, the priority event queue, the wire message types, the
//! longitudinal controller, the turn queue, the timer service, and the
//! graceful-shutdown latch. Leader- and follower-specific state machines and
//! topology live in their own binary crates.

pub mod clock;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod shutdown;
pub mod timers;
pub mod turn;
pub mod wire;

pub use clock::MatrixClock;
pub use error::PlatoonError;
pub use wire::{Direction, IntruderInfo, LeaderCommand, NetInfo, Truck, TruckState};
