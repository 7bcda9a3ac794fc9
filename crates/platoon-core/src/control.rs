// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Longitudinal controller (C5): closes the gap to the vehicle directly
//! ahead by blending a rate term on relative speed with a proportional term
//! on projected gap error. Grounded on `tp3/cruise_control.c`
//! (`calculate_gap`, `cruise_control_calculate_speed`); gains and the clamp
//! bound are taken from `config::{KP, KD, MAX_SPEED_OVER_BASE}` rather than
//! hard-coded at the call site as the C source does.

use crate::config::{KD, KP, MAX_SPEED_OVER_BASE, TARGET_GAP};
use crate::wire::Direction;

/// Translate `pos` backwards along `dir` by `offset`. Shared by the
/// leader's spawn-placement geometry and the follower's own spawn-snap
/// (`apply_cmd` step 2): both place a trailing vehicle a fixed distance
/// behind a leading one, along the leading vehicle's heading.
pub fn offset_against_heading(pos: (f32, f32), dir: Direction, offset: f32) -> (f32, f32) {
    let (x, y) = pos;
    match dir {
        Direction::North => (x, y - offset),
        Direction::South => (x, y + offset),
        Direction::East => (x - offset, y),
        Direction::West => (x + offset, y),
    }
}

/// Straight-line distance between two positions.
pub fn calculate_gap(self_pos: (f32, f32), front_pos: (f32, f32)) -> f32 {
    let dx = front_pos.0 - self_pos.0;
    let dy = front_pos.1 - self_pos.1;
    (dx * dx + dy * dy).sqrt()
}

/// The target gap to hold against the vehicle ahead: the nominal
/// [`TARGET_GAP`], widened by an intruder's length while one is present.
pub fn target_gap(intruder_length: Option<i32>) -> f32 {
    match intruder_length {
        Some(len) if len > 0 => TARGET_GAP + len as f32,
        _ => TARGET_GAP,
    }
}

/// Compute the next commanded speed for a follower tracking the vehicle
/// immediately ahead of it.
///
/// `projected_error` extrapolates one control period ahead: the gap minus
/// the desired gap, less however far the front vehicle is expected to
/// travel in that time. A positive projected error (gap opening up, or
/// expected to) pushes speed up; a negative one (closing in) pulls it down.
/// The result is clamped to `[0, leader_base_speed + MAX_SPEED_OVER_BASE]`
/// (I8) so a transient spike in error can never command an unbounded or
/// negative speed.
pub fn calculate_speed(
    self_pos: (f32, f32),
    front_pos: (f32, f32),
    current_speed: f32,
    front_speed: f32,
    leader_base_speed: f32,
    dt_secs: f32,
    desired_gap: f32,
) -> f32 {
    let gap = calculate_gap(self_pos, front_pos);
    let projected_error = (gap - desired_gap) - front_speed * dt_secs;
    let raw = leader_base_speed + KD * (front_speed - current_speed) + KP * projected_error;
    raw.clamp(0.0, leader_base_speed + MAX_SPEED_OVER_BASE)
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
