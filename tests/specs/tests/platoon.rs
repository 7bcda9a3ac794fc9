// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests driving real leader/follower worker threads over real
//! loopback TCP/UDP sockets. Complements the unit tests embedded in each
//! crate (clock, events, control, topology, watchdog, both FSMs) with the
//! properties that only show up once whole processes' worth of threads are
//! talking to each other.

use std::time::Duration;

use platoon_core::wire::TruckState;
use platoon_specs::{wait_until, RunningFollower, RunningLeader};

/// S1: with `min_followers` set to 3, the platoon is not "formed" until
/// the third follower registers, and every registered follower is
/// eventually assigned a distinct 1-based position.
#[test]
fn s1_platoon_forms_once_min_followers_have_registered() -> anyhow::Result<()> {
    let leader = RunningLeader::spawn(3)?;

    let f1 = RunningFollower::connect(leader.tcp_port)?;
    let f2 = RunningFollower::connect(leader.tcp_port)?;

    assert!(
        !wait_until(Duration::from_millis(300), || leader.is_formed()),
        "platoon must not be formed with only two of three required followers"
    );

    let f3 = RunningFollower::connect(leader.tcp_port)?;

    assert!(
        wait_until(Duration::from_secs(2), || leader.is_formed()),
        "platoon must form once the third follower registers"
    );
    assert_eq!(leader.active_follower_count(), 3);

    f1.shutdown();
    f2.shutdown();
    f3.shutdown();
    leader.shutdown();
    Ok(())
}

/// S2: with 4 followers formed (ids 1..4), closing the id-2 follower's
/// socket must compact the topology down to 3 active followers, re-densify
/// the survivors' ids (former id 3 becomes 2, former id 4 becomes 3 — I3),
/// and rewire the rear chain so id 1's rear points at the new id 2, the new
/// id 2's rear points at the new id 3, and the new id 3 (now tail) has
/// none.
#[test]
fn s2_middle_follower_disconnect_shrinks_active_count() -> anyhow::Result<()> {
    let leader = RunningLeader::spawn(4)?;

    let f1 = RunningFollower::connect(leader.tcp_port)?;
    let f2 = RunningFollower::connect(leader.tcp_port)?;
    let f3 = RunningFollower::connect(leader.tcp_port)?;
    let f4 = RunningFollower::connect(leader.tcp_port)?;

    assert!(wait_until(Duration::from_secs(2), || leader.is_formed()));
    assert_eq!(leader.active_follower_count(), 4);

    let position = |f: &RunningFollower| f.ctx.state.lock().unwrap_or_else(|e| e.into_inner()).platoon_position;
    assert_eq!(position(&f1), 1);
    assert_eq!(position(&f2), 2);
    assert_eq!(position(&f3), 3);
    assert_eq!(position(&f4), 4);

    f2.shutdown();

    assert!(
        wait_until(Duration::from_secs(2), || leader.active_follower_count() == 3),
        "topology must compact down to three active followers after a disconnect"
    );
    assert!(
        wait_until(Duration::from_secs(2), || position(&f3) == 2),
        "the follower that was id 3 must be reassigned to id 2"
    );
    assert!(
        wait_until(Duration::from_secs(2), || position(&f4) == 3),
        "the follower that was id 4 must be reassigned to id 3"
    );

    let rear_port = |f: &RunningFollower| {
        f.ctx.state.lock().unwrap_or_else(|e| e.into_inner()).rear_address.as_ref().map(|n| n.udp_port)
    };
    assert!(
        wait_until(Duration::from_secs(2), || rear_port(&f1) == Some(f3.ctx.config.udp_port)),
        "id 1's rear must be rewired to the new id 2 (former id 3)"
    );
    assert!(
        wait_until(Duration::from_secs(2), || rear_port(&f3) == Some(f4.ctx.config.udp_port)),
        "the new id 2's rear must be rewired to the new id 3 (former id 4)"
    );
    assert!(
        wait_until(Duration::from_secs(2), || rear_port(&f4).is_none()),
        "the new id 3 is now the tail and must have no rear"
    );

    f1.shutdown();
    f3.shutdown();
    f4.shutdown();
    leader.shutdown();
    Ok(())
}

/// S3: once a follower has left `Platooning` (here, by the platoon
/// forming and the leader sending its first `Cmd`) the leader-liveness
/// watchdog fires if the leader goes silent, moving the follower to
/// `Stopped` and zeroing its speed (I6/I7).
#[test]
fn s3_stale_leader_moves_follower_to_stopped() -> anyhow::Result<()> {
    let leader = RunningLeader::spawn(1)?;
    let follower = RunningFollower::connect(leader.tcp_port)?;

    assert!(
        wait_until(Duration::from_secs(2), || follower.state() == TruckState::Cruise),
        "follower should leave Platooning once formation completes and a Cmd arrives"
    );

    leader.shutdown();

    assert!(
        wait_until(Duration::from_secs(2), || follower.state() == TruckState::Stopped),
        "follower must transition to Stopped once the leader goes silent past its timeout"
    );
    assert_eq!(follower.speed(), 0.0);

    follower.shutdown();
    Ok(())
}

/// S5: an emergency brake broadcast from the leader drives every follower
/// to `EmergencyBrake` with zero speed, and forwards down the rear chain
/// to a follower with no direct leader-side visibility of the event.
#[test]
fn s5_emergency_brake_propagates_down_the_rear_chain() -> anyhow::Result<()> {
    let leader = RunningLeader::spawn(2)?;
    let f1 = RunningFollower::connect(leader.tcp_port)?;
    let f2 = RunningFollower::connect(leader.tcp_port)?;

    assert!(wait_until(Duration::from_secs(2), || leader.is_formed()));

    // Space bar is the leader's emergency-brake key (see
    // `platoon_leader::fsm::on_user_input`).
    leader.ctx.event_queue.push(platoon_core::events::Event::UserInput(' '));

    assert!(
        wait_until(Duration::from_secs(2), || f1.state() == TruckState::EmergencyBrake),
        "first follower must enter EmergencyBrake"
    );
    assert!(
        wait_until(Duration::from_secs(2), || f2.state() == TruckState::EmergencyBrake),
        "second follower must enter EmergencyBrake via the rear-chain UDP forward"
    );
    assert_eq!(f1.speed(), 0.0);
    assert_eq!(f2.speed(), 0.0);

    f1.shutdown();
    f2.shutdown();
    leader.shutdown();
    Ok(())
}

/// S6: a follower already in `EmergencyBrake` ignores an incoming
/// `CruiseCmd` until the 5-second auto-release timer fires and returns it
/// to `Cruise` on its own (exercises the `ArmEmergencyTimer` effect wired
/// up in `platoon_follower::fsm::on_emergency`).
#[test]
fn s6_cruise_cmd_is_ignored_during_emergency_brake_and_then_clears() -> anyhow::Result<()> {
    let leader = RunningLeader::spawn(1)?;
    let follower = RunningFollower::connect(leader.tcp_port)?;

    assert!(wait_until(Duration::from_secs(2), || leader.is_formed()));

    follower.ctx.event_queue.push(platoon_core::events::Event::Emergency);
    assert!(wait_until(Duration::from_secs(1), || follower.state() == TruckState::EmergencyBrake));

    // A CruiseCmd arriving while braking must not pull the follower back
    // into Cruise early; only the timer may do that.
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(follower.state(), TruckState::EmergencyBrake);

    // `EMERGENCY_BRAKE_DURATION` is a fixed 5s; wait past it for the
    // auto-release timer to fire and return the follower to Cruise.
    assert!(
        wait_until(Duration::from_secs(7), || follower.state() == TruckState::Cruise),
        "emergency brake must auto-release after the timer elapses"
    );

    follower.shutdown();
    leader.shutdown();
    Ok(())
}
