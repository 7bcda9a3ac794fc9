// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::UdpSocket;

use platoon_core::wire::Direction;

use super::*;
use crate::config::FollowerConfig;

fn test_config() -> FollowerConfig {
    FollowerConfig {
        udp_port: 0,
        leader_ip: "127.0.0.1".to_owned(),
        leader_port: 0,
        udp_bind_ip: "127.0.0.1".to_owned(),
        target_gap: 10.0,
        phys_dt_ms: 250,
        watchdog_period_ms: 100,
        leader_rx_timeout_ms: 2000,
        print_every_n: 5,
        log_format: "text".to_owned(),
        log_level: "info".to_owned(),
    }
}

fn test_context() -> FollowerContext {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind loopback udp");
    match std::sync::Arc::try_unwrap(FollowerContext::new(test_config(), socket)) {
        Ok(ctx) => ctx,
        Err(_) => panic!("unexpected extra Arc reference"),
    }
}

fn cmd(leader: platoon_core::wire::Truck) -> LeaderCommand {
    LeaderCommand { command_id: 1, leader, is_turning_event: false, turn_point: (0.0, 0.0), turn_dir: Direction::North }
}

fn leader_truck(x: f32, y: f32, speed: f32) -> platoon_core::wire::Truck {
    platoon_core::wire::Truck { x, y, speed, dir: Direction::North, state: TruckState::Cruise }
}

#[test]
fn platooning_cruise_cmd_enters_cruise() {
    let ctx = test_context();
    lock_state(&ctx).platoon_position = 1;
    let effects = handle_event(&ctx, Event::CruiseCmd(cmd(leader_truck(0.0, 10.0, 5.0))));
    assert!(effects.is_empty());
    assert_eq!(lock_truck(&ctx).state, TruckState::Cruise);
}

#[test]
fn spawn_snap_applies_exactly_once() {
    let ctx = test_context();
    {
        let mut state = lock_state(&ctx);
        state.platoon_position = 2;
        state.needs_spawn_snap = true;
    }
    handle_event(&ctx, Event::CruiseCmd(cmd(leader_truck(0.0, 100.0, 5.0))));
    let snapped = *lock_truck(&ctx);
    assert_eq!(snapped.x, 0.0);
    assert_eq!(snapped.y, 100.0 - (2.0 * TARGET_GAP + INTRUDER_LENGTH as f32));
    assert!(!lock_state(&ctx).needs_spawn_snap);

    // A second command must not re-snap even if the leader moved far away.
    handle_event(&ctx, Event::CruiseCmd(cmd(leader_truck(500.0, 500.0, 5.0))));
    assert_eq!(lock_truck(&ctx).y, snapped.y);
}

#[test]
fn cruise_cmd_ignored_in_emergency_brake() {
    let ctx = test_context();
    lock_truck(&ctx).state = TruckState::EmergencyBrake;
    handle_event(&ctx, Event::CruiseCmd(cmd(leader_truck(0.0, 50.0, 9.0))));
    let truck = lock_truck(&ctx);
    assert_eq!(truck.state, TruckState::EmergencyBrake);
    assert_eq!(truck.speed, 0.0);
}

#[test]
fn intruder_enters_intruder_follow_and_notifies_leader() {
    let ctx = test_context();
    lock_truck(&ctx).state = TruckState::Cruise;
    let info = IntruderInfo { speed: 40, length: 6, duration_ms: 8000 };
    let effects = handle_event(&ctx, Event::Intruder(info));
    assert!(matches!(effects.as_slice(), [Effect::NotifyLeaderIntruder(i)] if i.speed == 40));
    assert_eq!(lock_truck(&ctx).state, TruckState::IntruderFollow);
    assert_eq!(lock_state(&ctx).current_intruder, info);
}

#[test]
fn intruder_clear_returns_to_cruise_and_notifies() {
    let ctx = test_context();
    lock_truck(&ctx).state = TruckState::IntruderFollow;
    lock_state(&ctx).current_intruder = IntruderInfo { speed: 40, length: 6, duration_ms: 8000 };
    let effects = handle_event(&ctx, Event::IntruderClear);
    assert!(matches!(effects.as_slice(), [Effect::NotifyLeaderIntruder(i)] if i.is_clear()));
    assert_eq!(lock_truck(&ctx).state, TruckState::Cruise);
    assert!(lock_state(&ctx).current_intruder.is_clear());
}

#[test]
fn intruder_clear_is_a_no_op_outside_intruder_follow() {
    let ctx = test_context();
    lock_truck(&ctx).state = TruckState::Cruise;
    let effects = handle_event(&ctx, Event::IntruderClear);
    assert!(effects.is_empty());
}

#[test]
fn emergency_enters_emergency_brake_and_forwards_when_there_is_a_rear_peer() {
    let ctx = test_context();
    lock_truck(&ctx).state = TruckState::Cruise;
    lock_state(&ctx).has_rear = true;
    let effects = handle_event(&ctx, Event::Emergency);
    assert!(matches!(effects.as_slice(), [Effect::ArmEmergencyTimer, Effect::ForwardEmergencyBrakeUdp]));
    let truck = lock_truck(&ctx);
    assert_eq!(truck.state, TruckState::EmergencyBrake);
    assert_eq!(truck.speed, 0.0);
}

#[test]
fn emergency_without_rear_peer_does_not_forward() {
    let ctx = test_context();
    lock_truck(&ctx).state = TruckState::Cruise;
    let effects = handle_event(&ctx, Event::Emergency);
    assert!(matches!(effects.as_slice(), [Effect::ArmEmergencyTimer]));
    assert_eq!(lock_truck(&ctx).state, TruckState::EmergencyBrake);
}

#[test]
fn emergency_timer_returns_to_cruise() {
    let ctx = test_context();
    lock_truck(&ctx).state = TruckState::EmergencyBrake;
    handle_event(&ctx, Event::EmergencyTimer);
    assert_eq!(lock_truck(&ctx).state, TruckState::Cruise);
}

#[test]
fn leader_timeout_stops_cruise_and_intruder_follow() {
    let ctx = test_context();
    lock_truck(&ctx).state = TruckState::Cruise;
    handle_event(&ctx, Event::LeaderTimeout);
    let truck = lock_truck(&ctx);
    assert_eq!(truck.state, TruckState::Stopped);
    assert_eq!(truck.speed, 0.0);
}

/// Recovery: a fresh CruiseCmd takes a Stopped follower back to Cruise.
#[test]
fn stopped_recovers_to_cruise_on_fresh_cmd() {
    let ctx = test_context();
    lock_truck(&ctx).state = TruckState::Stopped;
    lock_state(&ctx).platoon_position = 1;
    handle_event(&ctx, Event::CruiseCmd(cmd(leader_truck(0.0, 10.0, 5.0))));
    assert_eq!(lock_truck(&ctx).state, TruckState::Cruise);
}

#[test]
fn distance_while_stopped_updates_front_ref_only() {
    let ctx = test_context();
    lock_truck(&ctx).state = TruckState::Stopped;
    lock_state(&ctx).platoon_position = 2;
    handle_event(&ctx, Event::Distance { x: 3.0, y: 4.0, speed: 9.0 });
    let truck = lock_truck(&ctx);
    assert_eq!(truck.speed, 0.0);
    let state = lock_state(&ctx);
    assert_eq!((state.front_ref.x, state.front_ref.y), (3.0, 4.0));
}

#[test]
fn position_one_ignores_distance_and_keeps_following_leader() {
    let ctx = test_context();
    lock_truck(&ctx).state = TruckState::Cruise;
    lock_state(&ctx).platoon_position = 1;
    let effects = handle_event(&ctx, Event::Distance { x: 0.0, y: 1.0, speed: 3.0 });
    assert!(effects.is_empty());
    assert!(!lock_state(&ctx).have_front_position);
}

/// A turning command queues a waypoint the physics loop will later consume.
#[test]
fn turning_cmd_enqueues_a_waypoint() {
    let ctx = test_context();
    lock_state(&ctx).platoon_position = 1;
    let mut turning = cmd(leader_truck(0.0, 10.0, 5.0));
    turning.is_turning_event = true;
    turning.turn_point = (0.0, 10.0);
    turning.turn_dir = Direction::East;
    handle_event(&ctx, Event::CruiseCmd(turning));
    assert_eq!(lock_state(&ctx).turn_queue.len(), 1);
}
