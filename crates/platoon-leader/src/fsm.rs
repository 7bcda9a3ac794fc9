// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Leader FSM (C7). Grounded on `leader.c`'s `leader_state_machine`. The FSM
//! thread is the sole writer of `ctx.truck.state`; every other thread only
//! ever pushes an [`platoon_core::events::Event`] or reads a consistent
//! snapshot under `ctx.truck`'s lock.
//!
//! State transitions are performed in-line against `ctx`; anything that
//! needs to leave the FSM thread (a TCP write, a broadcast) is returned as
//! an [`Effect`] for the caller to dispatch, keeping every wire write out of
//! the FSM's own critical section.

use platoon_core::events::{Event, FollowerMsgEvent};
use platoon_core::wire::{Direction, FollowerPayload, LeaderCommand, TruckState};

use crate::context::{LeaderContext, PendingTurn};
use crate::topology::FinalizedFollower;

/// A side effect the FSM wants performed outside its own critical section.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Re-finalization: send fresh `AssignId` + `UpdateRear` to every
    /// active follower per `FinalizedFollower`.
    Reform(Vec<FinalizedFollower>),
    BroadcastCmd(LeaderCommand),
    BroadcastEmergencyBrake,
    RequestShutdown,
    /// A user-input hint to print before formation completes.
    Hint(&'static str),
}

/// Process one event against `ctx`, returning the effects the caller must
/// dispatch. Every inbound/outbound wire message's clock bookkeeping
/// (`on_receive`/`on_send`) is the caller's responsibility at the point it
/// actually reads/writes the socket, not here.
pub fn handle_event(ctx: &LeaderContext, event: Event) -> Vec<Effect> {
    match event {
        Event::PlatoonFormed => on_platoon_formed(ctx),
        Event::Tick => on_tick(ctx),
        Event::UserInput(c) => on_user_input(ctx, c),
        Event::FollowerMsg(msg) => on_follower_msg(ctx, msg),
        Event::Shutdown => vec![Effect::RequestShutdown],
        // Priority levels below 9 (LeaderTimeout, Intruder, Distance,
        // CruiseCmd, IntruderClear, EmergencyTimer) are follower-only and
        // never constructed on the leader side.
        _ => Vec::new(),
    }
}

fn on_platoon_formed(ctx: &LeaderContext) -> Vec<Effect> {
    let finalized = {
        let mut followers = ctx.followers.lock().unwrap_or_else(|e| e.into_inner());
        followers.finalize()
    };
    ctx.formation_complete.store(true, std::sync::atomic::Ordering::SeqCst);
    vec![Effect::Reform(finalized)]
}

fn on_tick(ctx: &LeaderContext) -> Vec<Effect> {
    if !ctx.formation_complete.load(std::sync::atomic::Ordering::SeqCst)
        || ctx.stale_mode.load(std::sync::atomic::Ordering::SeqCst)
    {
        return Vec::new();
    }

    let pending_turn = ctx.pending_turn.lock().unwrap_or_else(|e| e.into_inner()).take();
    let mut truck = ctx.truck.lock().unwrap_or_else(|e| e.into_inner());

    let (is_turning_event, turn_point, turn_dir) = match pending_turn {
        Some(PendingTurn { dir }) => {
            truck.dir = dir;
            (true, (truck.x, truck.y), dir)
        }
        None => (false, (0.0, 0.0), truck.dir),
    };

    truck.integrate(ctx.config.tick_dt_ms as f32 / 1000.0);

    let command_id = ctx.next_cmd_id();
    let cmd = LeaderCommand {
        command_id,
        leader: *truck,
        is_turning_event,
        turn_point,
        turn_dir,
    };
    drop(truck);

    vec![Effect::BroadcastCmd(cmd)]
}

fn on_user_input(ctx: &LeaderContext, c: char) -> Vec<Effect> {
    if !ctx.formation_complete.load(std::sync::atomic::Ordering::SeqCst) {
        return vec![Effect::Hint("platoon not yet formed; command ignored")];
    }

    match c {
        'w' => {
            let mut truck = ctx.truck.lock().unwrap_or_else(|e| e.into_inner());
            truck.speed += 0.5;
            truck.state = TruckState::Cruise;
            Vec::new()
        }
        's' => {
            let mut truck = ctx.truck.lock().unwrap_or_else(|e| e.into_inner());
            truck.speed -= 0.5;
            if truck.speed <= 0.0 {
                truck.speed = 0.0;
                truck.state = TruckState::Stopped;
            } else {
                truck.state = TruckState::Cruise;
            }
            Vec::new()
        }
        'a' => {
            let dir = {
                let truck = ctx.truck.lock().unwrap_or_else(|e| e.into_inner());
                truck.dir.turn_left()
            };
            *ctx.pending_turn.lock().unwrap_or_else(|e| e.into_inner()) = Some(PendingTurn { dir });
            Vec::new()
        }
        'd' => {
            let dir = {
                let truck = ctx.truck.lock().unwrap_or_else(|e| e.into_inner());
                truck.dir.turn_right()
            };
            *ctx.pending_turn.lock().unwrap_or_else(|e| e.into_inner()) = Some(PendingTurn { dir });
            Vec::new()
        }
        ' ' => {
            let mut truck = ctx.truck.lock().unwrap_or_else(|e| e.into_inner());
            truck.speed = 0.0;
            truck.state = TruckState::EmergencyBrake;
            drop(truck);
            vec![Effect::BroadcastEmergencyBrake]
        }
        'p' => {
            ctx.stale_mode.fetch_xor(true, std::sync::atomic::Ordering::SeqCst);
            Vec::new()
        }
        'q' => vec![Effect::RequestShutdown],
        _ => Vec::new(),
    }
}

fn on_follower_msg(ctx: &LeaderContext, msg: FollowerMsgEvent) -> Vec<Effect> {
    match msg.msg.payload {
        FollowerPayload::IntruderReport(info) => {
            let mut truck = ctx.truck.lock().unwrap_or_else(|e| e.into_inner());
            if info.is_clear() {
                truck.state = TruckState::Cruise;
                ctx.leader_intruder_length.store(0, std::sync::atomic::Ordering::SeqCst);
            } else {
                truck.state = TruckState::IntruderFollow;
                truck.speed = info.speed as f32;
                ctx.leader_intruder_length.store(info.length, std::sync::atomic::Ordering::SeqCst);
            }
            Vec::new()
        }
        FollowerPayload::EmergencyBrake => {
            let mut truck = ctx.truck.lock().unwrap_or_else(|e| e.into_inner());
            truck.speed = 0.0;
            truck.state = TruckState::EmergencyBrake;
            drop(truck);
            vec![Effect::BroadcastEmergencyBrake]
        }
        FollowerPayload::Position { .. } | FollowerPayload::Unknown => Vec::new(),
    }
}

/// Spawn geometry (§6): for a follower of assigned id `k`,
/// `offset = k*target_gap + intruder_length + leader_intruder_length`,
/// translated against the leader's current heading.
pub fn spawn_position(
    leader_pos: (f32, f32),
    leader_dir: Direction,
    id: u32,
    target_gap: f32,
    intruder_length: i32,
    leader_intruder_length: i32,
) -> (f32, f32) {
    let offset = id as f32 * target_gap + (intruder_length + leader_intruder_length) as f32;
    platoon_core::control::offset_against_heading(leader_pos, leader_dir, offset)
}

#[cfg(test)]
#[path = "fsm_tests.rs"]
mod tests;
