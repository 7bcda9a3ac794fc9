// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Follower FSM (C8). Grounded on `follower.c`'s `follower_state_machine`.
//! Like the leader FSM, every state write happens inline against `ctx`
//! under its locks; anything that must leave this thread (a TCP notify to
//! the leader, a UDP forward to the rear peer) comes back as an [`Effect`]
//! for the caller to dispatch.

use platoon_core::config::{INTRUDER_LENGTH, TARGET_GAP};
use platoon_core::control;
use platoon_core::turn::Waypoint;
use platoon_core::wire::{IntruderInfo, LeaderCommand, TruckState};

use crate::context::FollowerContext;

/// A side effect the FSM wants performed outside its own critical section.
#[derive(Debug, Clone, Copy)]
pub enum Effect {
    NotifyLeaderIntruder(IntruderInfo),
    ForwardEmergencyBrakeUdp,
    ArmEmergencyTimer,
    RequestShutdown,
}

use platoon_core::events::Event;

pub fn handle_event(ctx: &FollowerContext, event: Event) -> Vec<Effect> {
    match event {
        Event::Emergency => on_emergency(ctx),
        Event::LeaderTimeout => on_leader_timeout(ctx),
        Event::Intruder(info) => on_intruder(ctx, info),
        Event::Distance { x, y, speed } => on_distance(ctx, x, y, speed),
        Event::CruiseCmd(cmd) => on_cruise_cmd(ctx, cmd),
        Event::IntruderClear => on_intruder_clear(ctx),
        Event::EmergencyTimer => on_emergency_timer(ctx),
        Event::Shutdown => vec![Effect::RequestShutdown],
        // Priority levels 7-10 (Tick, UserInput, FollowerMsg, PlatoonFormed)
        // belong to the leader side and are never constructed here.
        _ => Vec::new(),
    }
}

fn lock_truck(ctx: &FollowerContext) -> std::sync::MutexGuard<'_, platoon_core::wire::Truck> {
    ctx.truck.lock().unwrap_or_else(|e| e.into_inner())
}

fn lock_state(ctx: &FollowerContext) -> std::sync::MutexGuard<'_, crate::context::FollowerState> {
    ctx.state.lock().unwrap_or_else(|e| e.into_inner())
}

fn on_emergency(ctx: &FollowerContext) -> Vec<Effect> {
    let mut truck = lock_truck(ctx);
    if truck.state == TruckState::EmergencyBrake {
        // "stay": the timer already armed on the original entry keeps
        // running unchanged; nothing new to arm or forward.
        return Vec::new();
    }
    truck.speed = 0.0;
    truck.state = TruckState::EmergencyBrake;
    let has_rear = lock_state(ctx).has_rear;
    drop(truck);
    let mut effects = vec![Effect::ArmEmergencyTimer];
    if has_rear {
        effects.push(Effect::ForwardEmergencyBrakeUdp);
    }
    effects
}

fn on_emergency_timer(ctx: &FollowerContext) -> Vec<Effect> {
    let mut truck = lock_truck(ctx);
    if truck.state == TruckState::EmergencyBrake {
        truck.state = TruckState::Cruise;
    }
    Vec::new()
}

fn on_leader_timeout(ctx: &FollowerContext) -> Vec<Effect> {
    let mut truck = lock_truck(ctx);
    match truck.state {
        TruckState::Cruise | TruckState::IntruderFollow => {
            truck.speed = 0.0;
            truck.state = TruckState::Stopped;
        }
        // Platooning never reaches here (the watchdog is muted there);
        // Stopped stays, EmergencyBrake ignores.
        _ => {}
    }
    Vec::new()
}

fn on_intruder(ctx: &FollowerContext, info: IntruderInfo) -> Vec<Effect> {
    let mut truck = lock_truck(ctx);
    match truck.state {
        TruckState::Cruise => {
            truck.state = TruckState::IntruderFollow;
            drop(truck);
            lock_state(ctx).current_intruder = info;
            vec![Effect::NotifyLeaderIntruder(info)]
        }
        TruckState::IntruderFollow => {
            drop(truck);
            lock_state(ctx).current_intruder = info;
            Vec::new()
        }
        _ => Vec::new(),
    }
}

fn on_intruder_clear(ctx: &FollowerContext) -> Vec<Effect> {
    let mut truck = lock_truck(ctx);
    if truck.state != TruckState::IntruderFollow {
        return Vec::new();
    }
    truck.state = TruckState::Cruise;
    drop(truck);
    lock_state(ctx).current_intruder = IntruderInfo::clear();
    vec![Effect::NotifyLeaderIntruder(IntruderInfo::clear())]
}

fn on_distance(ctx: &FollowerContext, x: f32, y: f32, speed: f32) -> Vec<Effect> {
    let state_snapshot = lock_truck(ctx).state;
    match state_snapshot {
        TruckState::Cruise | TruckState::IntruderFollow => apply_distance(ctx, x, y, speed),
        TruckState::Stopped => {
            // "update front_ref only": record where the peer is, but never
            // feed it to the controller while stopped.
            let mut state = lock_state(ctx);
            state.front_ref.x = x;
            state.front_ref.y = y;
            state.front_ref.speed = speed;
            state.have_front_position = true;
            Vec::new()
        }
        _ => Vec::new(),
    }
}

fn apply_distance(ctx: &FollowerContext, x: f32, y: f32, speed: f32) -> Vec<Effect> {
    let mut state = lock_state(ctx);
    state.front_ref.x = x;
    state.front_ref.y = y;
    state.front_ref.speed = speed;
    state.have_front_position = true;

    if state.platoon_position <= 1 {
        // Position 1 always follows the leader directly; a stray Distance
        // (from a misrouted UDP peer) is recorded but not acted on.
        return Vec::new();
    }

    let target_gap = current_target_gap(&state);
    state.current_target_gap = target_gap;
    let leader_base_speed = state.leader_base_speed;
    drop(state);

    let mut truck = lock_truck(ctx);
    let new_speed = control::calculate_speed(
        (truck.x, truck.y),
        (x, y),
        truck.speed,
        speed,
        leader_base_speed,
        ctx.config.phys_dt_secs(),
        target_gap,
    );
    truck.speed = new_speed;
    Vec::new()
}

fn current_target_gap(state: &crate::context::FollowerState) -> f32 {
    if state.current_intruder.is_clear() {
        control::target_gap(None)
    } else {
        control::target_gap(Some(state.current_intruder.length))
    }
}

fn on_cruise_cmd(ctx: &FollowerContext, cmd: LeaderCommand) -> Vec<Effect> {
    {
        let truck_state = lock_truck(ctx).state;
        match truck_state {
            TruckState::EmergencyBrake => return Vec::new(),
            TruckState::Platooning => {
                apply_cmd(ctx, &cmd);
                lock_truck(ctx).state = TruckState::Cruise;
                return Vec::new();
            }
            TruckState::Stopped => {
                apply_cmd(ctx, &cmd);
                lock_truck(ctx).state = TruckState::Cruise;
                return Vec::new();
            }
            TruckState::Cruise | TruckState::IntruderFollow => {}
        }
    }
    apply_cmd(ctx, &cmd);
    Vec::new()
}

/// Record the leader's base speed, perform the one-time spawn snap, pick a
/// control source, and drive the controller.
fn apply_cmd(ctx: &FollowerContext, cmd: &LeaderCommand) {
    let mut truck = lock_truck(ctx);
    let mut state = lock_state(ctx);
    state.leader_base_speed = cmd.leader.speed;

    if cmd.is_turning_event {
        state.turn_queue.push(Waypoint { x: cmd.turn_point.0, y: cmd.turn_point.1, dir: cmd.turn_dir });
    }

    let platoon_position = state.platoon_position;

    if state.needs_spawn_snap && platoon_position > 0 {
        let offset = platoon_position as f32 * TARGET_GAP + INTRUDER_LENGTH as f32;
        let (x, y) = control::offset_against_heading((cmd.leader.x, cmd.leader.y), cmd.leader.dir, offset);
        truck.x = x;
        truck.y = y;
        truck.dir = cmd.leader.dir;
        state.needs_spawn_snap = false;
    }

    // Control source: position 1 (or not yet caught up to the truck ahead)
    // follows the leader directly; once an upstream Distance has arrived,
    // apply_distance already drives the controller and this call is a
    // cheap no-op re-anchor against the leader's own base speed.
    let follow_leader = platoon_position <= 1 || !state.have_front_position;
    let target_gap = current_target_gap(&state);
    state.current_target_gap = target_gap;

    if follow_leader {
        let new_speed = control::calculate_speed(
            (truck.x, truck.y),
            (cmd.leader.x, cmd.leader.y),
            truck.speed,
            cmd.leader.speed,
            cmd.leader.speed,
            ctx.config.phys_dt_secs(),
            target_gap,
        );
        truck.speed = new_speed;
    }
}

#[cfg(test)]
#[path = "fsm_tests.rs"]
mod tests;
