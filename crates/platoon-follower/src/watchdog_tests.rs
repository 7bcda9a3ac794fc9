// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

/// I6: a follower in Platooning never emits LeaderTimeout no matter how
/// long the leader is silent.
#[test]
fn invariant_i6_platooning_mutes_the_watchdog() {
    let action = evaluate(1_000_000, 0, 2000, TruckState::Platooning, false);
    assert_eq!(action, Action::None);
}

/// S3 — stale leader: at t = last_rx + 2001ms, one LeaderTimeout fires.
#[test]
fn s3_stale_leader_emits_timeout_past_threshold() {
    let action = evaluate(1000 + 2001, 1000, 2000, TruckState::Cruise, false);
    assert_eq!(action, Action::EmitTimeout);
}

#[test]
fn fresh_leader_does_not_emit_timeout() {
    let action = evaluate(1000 + 500, 1000, 2000, TruckState::Cruise, false);
    assert_eq!(action, Action::None);
}

/// I7: at most one LeaderTimeout is enqueued between any two fresh leader
/// messages — once emitted, further stale ticks produce nothing.
#[test]
fn invariant_i7_no_repeat_timeout_once_emitted() {
    let action = evaluate(1000 + 2500, 1000, 2000, TruckState::Stopped, true);
    assert_eq!(action, Action::None);
}

#[test]
fn exactly_at_threshold_is_not_yet_stale() {
    let action = evaluate(1000 + 2000, 1000, 2000, TruckState::Cruise, false);
    assert_eq!(action, Action::None);
}

#[test]
fn intruder_follow_state_is_also_watched() {
    let action = evaluate(5000, 1000, 2000, TruckState::IntruderFollow, false);
    assert_eq!(action, Action::EmitTimeout);
}
