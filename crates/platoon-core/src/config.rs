// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tunables shared by both roles. Mirrors the `#define`s in the original
//! `truckplatoon.h`; every one of these is overridable on the CLI of the
//! leader/follower binaries, but the defaults below are the source of truth.

use std::time::Duration;

/// Maximum simultaneously registered followers.
pub const MAX_FOLLOWERS: usize = 5;

/// Total nodes tracked by the matrix clock: the leader (index 0) plus one
/// row/column per possible follower position `1..=MAX_FOLLOWERS`. Derived
/// from `MAX_FOLLOWERS` rather than fixed at the canonical formation size
/// (`MIN_FOLLOWERS`) so a fully-populated platoon never indexes the clock
/// out of bounds.
pub const NUM_TRUCKS: usize = MAX_FOLLOWERS + 1;

/// Followers required before the leader considers the platoon formed.
pub const MIN_FOLLOWERS: usize = 3;

/// Desired longitudinal gap to the front neighbour, in simulation units.
pub const TARGET_GAP: f32 = 10.0;

/// Additional gap margin attributed to an intruder vehicle's length.
pub const INTRUDER_LENGTH: i32 = 10;

/// Leader tick-producer / follower physics cadence.
pub const LEADER_TICK_DT: Duration = Duration::from_millis(250);
pub const FOLLOWER_PHYS_DT: Duration = Duration::from_millis(250);
pub const CONTROL_DT: Duration = FOLLOWER_PHYS_DT;

/// Controller clamp: follower speed may not exceed `leader_base_speed + this`.
pub const MAX_SPEED_OVER_BASE: f32 = 100.0;

/// Controller gains (see `control::calculate_speed`).
pub const KP: f32 = 0.35;
pub const KD: f32 = 0.70;

/// Follower-side leader-liveness watchdog.
pub const LEADER_RX_TIMEOUT_MS: u64 = 2000;
pub const WATCHDOG_PERIOD_MS: u64 = 100;

/// Leader outbound command ring capacity.
pub const CMD_QUEUE_SIZE: usize = 10;

/// Per-priority-level event ring capacity.
pub const MAX_EVENTS: usize = 32;

/// Status line decimation (print/trace every Nth tick).
pub const LEADER_PRINT_EVERY_N: u64 = 5;
pub const FOLLOWER_PRINT_EVERY_N: u64 = 5;

/// How long a truck stays in `EmergencyBrake` before the timer fires.
pub const EMERGENCY_BRAKE_DURATION: Duration = Duration::from_secs(5);

/// Default leader rendezvous address.
pub const DEFAULT_LEADER_IP: &str = "127.0.0.1";
pub const DEFAULT_LEADER_PORT: u16 = 5000;

/// Chance (percent) that toggling the intruder on rolls a fresh encounter.
pub const INTRUDER_PROBABILITY_PCT: u32 = 10;

/// Random ranges for a generated intruder (matches `intruder.c`).
pub const INTRUDER_SPEED_RANGE: std::ops::RangeInclusive<i32> = 30..=120;
pub const INTRUDER_LENGTH_RANGE: std::ops::RangeInclusive<i32> = 3..=20;
pub const INTRUDER_DURATION_MS_RANGE: std::ops::RangeInclusive<u32> = 5000..=10000;
