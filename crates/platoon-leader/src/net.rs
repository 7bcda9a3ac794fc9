// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Leader-side TCP plumbing: the accept loop that registers followers, a
//! per-connection reader thread for each, and a broadcaster thread that
//! drains the outbound command ring. Grounded on `leader.c`'s accept/select
//! loop and `broadcast_to_followers`.
//!
//! The original multiplexes every follower fd through a single `select()`
//! loop on one thread. This crate generalizes that into one reader thread
//! per accepted connection instead — the idiomatic shape for a
//! thread-per-connection Rust server, and equivalent in effect: each
//! follower's traffic is still read independently and fed into the same
//! priority event queue.

use std::net::{TcpListener, TcpStream};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use platoon_core::events::{Event, FollowerMsgEvent};
use platoon_core::wire::{
    recv_framed, write_frame, FollowerMsg, LeaderCommand, LeaderMsg, LeaderPayload, NetInfoWire,
    RegisterMsg,
};

use crate::context::LeaderContext;
use crate::fsm::spawn_position;
use crate::topology::{FinalizedFollower, RegisterOutcome};

fn send(ctx: &LeaderContext, stream: &mut TcpStream, payload: LeaderPayload) {
    let clock = {
        let mut clock = ctx.clock.lock().unwrap_or_else(|e| e.into_inner());
        clock.on_send(0);
        *clock
    };
    if let Err(err) = write_frame(stream, &LeaderMsg { payload, clock }) {
        warn!(%err, "failed to write to follower socket");
    }
}

/// Accept followers until shutdown, registering each and kicking off its
/// reader thread. Blocks the calling thread.
pub fn accept_loop(ctx: Arc<LeaderContext>, listener: TcpListener) {
    while !ctx.shutdown.is_requested() {
        let (mut stream, peer) = match listener.accept() {
            Ok(pair) => pair,
            Err(err) => {
                if ctx.shutdown.is_requested() {
                    return;
                }
                warn!(%err, "accept failed");
                continue;
            }
        };
        debug!(%peer, "accepted follower connection");

        let register: Option<RegisterMsg> = match recv_framed(&mut stream) {
            Ok(v) => v,
            Err(err) => {
                warn!(%err, "failed to read registration message");
                continue;
            }
        };
        let Some(register) = register else {
            warn!("follower disconnected before registering");
            continue;
        };

        {
            let mut clock = ctx.clock.lock().unwrap_or_else(|e| e.into_inner());
            clock.on_receive(0, &register.clock);
        }

        let stream_clone = match stream.try_clone() {
            Ok(s) => s,
            Err(err) => {
                warn!(%err, "failed to clone follower stream");
                continue;
            }
        };

        let outcome = {
            let mut followers = ctx.followers.lock().unwrap_or_else(|e| e.into_inner());
            followers.register(stream_clone, register.self_address)
        };

        let (id, conn_id) = match outcome {
            RegisterOutcome::Assigned { id, conn_id } => (id, conn_id),
            RegisterOutcome::Full => {
                warn!("topology full, rejecting follower registration");
                continue;
            }
        };
        info!(id, %peer, "follower registered");

        let (leader_pos, leader_dir) = {
            let truck = ctx.truck.lock().unwrap_or_else(|e| e.into_inner());
            ((truck.x, truck.y), truck.dir)
        };
        let intruder_len = ctx.leader_intruder_length.load(Ordering::SeqCst);
        let spawn_pos = spawn_position(
            leader_pos,
            leader_dir,
            id,
            ctx.config.target_gap,
            ctx.config.intruder_length,
            intruder_len,
        );

        send(&ctx, &mut stream, LeaderPayload::AssignId { id });
        send(
            &ctx,
            &mut stream,
            LeaderPayload::Spawn { id, pos: spawn_pos, dir: leader_dir },
        );

        let active = {
            let followers = ctx.followers.lock().unwrap_or_else(|e| e.into_inner());
            followers.active_count()
        };
        if active >= ctx.config.min_followers {
            ctx.event_queue.push(Event::PlatoonFormed);
        }

        let reader_ctx = Arc::clone(&ctx);
        let mut reader_stream = stream;
        thread::spawn(move || follower_reader(reader_ctx, &mut reader_stream, conn_id, id));
    }
}

/// Reads one follower's TCP traffic until it disconnects or the process
/// shuts down. On a clean disconnect, re-finalizes the topology if the
/// platoon was already formed.
fn follower_reader(ctx: Arc<LeaderContext>, stream: &mut TcpStream, conn_id: u64, follower_id: u32) {
    loop {
        let msg: Option<FollowerMsg> = match recv_framed(stream) {
            Ok(v) => v,
            Err(err) => {
                if ctx.shutdown.is_requested() {
                    return;
                }
                warn!(%err, follower_id, "follower read error, treating as disconnect");
                None
            }
        };

        let Some(msg) = msg else {
            handle_disconnect(&ctx, conn_id, follower_id);
            return;
        };

        {
            let mut clock = ctx.clock.lock().unwrap_or_else(|e| e.into_inner());
            clock.on_receive(0, &msg.clock);
        }
        ctx.event_queue.push(Event::FollowerMsg(FollowerMsgEvent { follower_id, msg }));
    }
}

fn handle_disconnect(ctx: &LeaderContext, conn_id: u64, follower_id: u32) {
    let (remaining, was_formed) = {
        let mut followers = ctx.followers.lock().unwrap_or_else(|e| e.into_inner());
        followers.disconnect(conn_id);
        (followers.active_count(), ctx.formation_complete.load(Ordering::SeqCst))
    };
    warn!(follower_id, remaining, "follower disconnected");

    if remaining == 0 {
        ctx.formation_complete.store(false, Ordering::SeqCst);
    } else if was_formed {
        ctx.event_queue.push(Event::PlatoonFormed);
    }
}

/// Apply a [`crate::fsm::Effect::Reform`]: send fresh `AssignId` then
/// `UpdateRear` to every active follower.
pub fn apply_reform(ctx: &LeaderContext, finalized: Vec<FinalizedFollower>) {
    let mut followers = ctx.followers.lock().unwrap_or_else(|e| e.into_inner());
    for f in &finalized {
        let rear_wire = f.rear.as_ref().map(NetInfoWire::from_net_info);
        let has_rear = rear_wire.is_some();
        followers.with_session(f.conn_id, |session| {
            if let Some(stream) = session.stream.as_mut() {
                send(ctx, stream, LeaderPayload::AssignId { id: f.id });
                send(ctx, stream, LeaderPayload::UpdateRear { has_rear, rear: rear_wire });
            }
        });
    }
}

/// Broadcast `Cmd(cmd)` to every active follower. A single failing send
/// does not abort the loop.
pub fn broadcast_cmd(ctx: &LeaderContext, cmd: LeaderCommand) {
    let clock = {
        let mut clock = ctx.clock.lock().unwrap_or_else(|e| e.into_inner());
        clock.on_send(0);
        *clock
    };
    let msg = LeaderMsg { payload: LeaderPayload::Cmd(cmd), clock };
    let mut followers = ctx.followers.lock().unwrap_or_else(|e| e.into_inner());
    followers.broadcast(|session| {
        if let Some(stream) = session.stream.as_mut() {
            if let Err(err) = write_frame(stream, &msg) {
                warn!(%err, id = session.id, "failed to broadcast command");
            }
        }
    });
}

/// Broadcast `EmergencyBrake` to every active follower.
pub fn broadcast_emergency_brake(ctx: &LeaderContext) {
    let clock = {
        let mut clock = ctx.clock.lock().unwrap_or_else(|e| e.into_inner());
        clock.on_send(0);
        *clock
    };
    let msg = LeaderMsg { payload: LeaderPayload::EmergencyBrake, clock };
    let mut followers = ctx.followers.lock().unwrap_or_else(|e| e.into_inner());
    followers.broadcast(|session| {
        if let Some(stream) = session.stream.as_mut() {
            let _ = stream.set_write_timeout(Some(Duration::from_millis(500)));
            if let Err(err) = write_frame(stream, &msg) {
                warn!(%err, id = session.id, "failed to broadcast emergency brake");
            }
        }
    });
}

/// Drain `ctx.cmd_queue` and broadcast every pending command, in order.
/// Blocks on `cmd_queue_cv` until a command is queued (§5's "TCP sender
/// blocks on a cond-var"), with a short timeout so it still notices
/// shutdown promptly when no command is pending.
pub fn command_sender_loop(ctx: Arc<LeaderContext>) {
    while !ctx.shutdown.is_requested() {
        match ctx.pop_cmd_timeout(Duration::from_millis(100)) {
            Some(cmd) => broadcast_cmd(&ctx, cmd),
            None => continue,
        }
    }
}
