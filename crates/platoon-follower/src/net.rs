// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Follower-side network plumbing: TCP connect/register/receive against the
//! leader, and UDP send/receive against the rear-chain peers. Grounded on
//! `follower.c`'s connect-and-register sequence and its `recvfrom`/`sendto`
//! pair for the UDP telemetry ring.
//!
//! All three transports (leader TCP read, leader TCP write, rear-chain UDP)
//! share the same envelope types as the leader crate; only the framing
//! differs — TCP carries a length prefix, UDP relies on the datagram
//! boundary already delineating one message.

use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, info, warn};

use platoon_core::events::Event;
use platoon_core::wire::{
    decode_datagram, encode_datagram, recv_framed, write_frame, FollowerMsg, FollowerPayload,
    LeaderMsg, LeaderPayload, NetInfo, RegisterMsg,
};

use crate::context::FollowerContext;
use crate::watchdog;

/// Connect to the leader and complete registration, stashing the live
/// stream in `ctx.leader_stream`. Returns the connected stream for the
/// caller to hand off to a reader thread.
pub fn register_with_leader(ctx: &FollowerContext) -> std::io::Result<TcpStream> {
    let addr = format!("{}:{}", ctx.config.leader_ip, ctx.config.leader_port);
    let mut stream = TcpStream::connect(&addr)?;
    info!(%addr, "connected to leader");

    let local_ip = ctx
        .udp_socket
        .local_addr()
        .map(|a| a.ip().to_string())
        .unwrap_or_else(|_| "0.0.0.0".to_owned());
    let udp_port = ctx.config.udp_port;

    let clock = {
        let mut clock = ctx.clock.lock().unwrap_or_else(|e| e.into_inner());
        clock.on_send(0);
        *clock
    };
    let register = RegisterMsg { self_address: NetInfo { ip: local_ip, udp_port }, clock };
    write_frame(&mut stream, &register)?;

    let cloned = stream.try_clone()?;
    *ctx.leader_stream.lock().unwrap_or_else(|e| e.into_inner()) = Some(stream);
    Ok(cloned)
}

/// Reads the leader's TCP stream until it disconnects or the process shuts
/// down, dispatching each message into either direct context mutation
/// (`AssignId`, `Spawn`, `UpdateRear` — topology bookkeeping, not FSM
/// transitions) or the event queue (`Cmd`, `EmergencyBrake`).
pub fn leader_reader(ctx: Arc<FollowerContext>, mut stream: TcpStream) {
    loop {
        let msg: Option<LeaderMsg> = match recv_framed(&mut stream) {
            Ok(v) => v,
            Err(err) => {
                if ctx.shutdown.is_requested() {
                    return;
                }
                warn!(%err, "leader read error, treating as disconnect");
                None
            }
        };
        let Some(msg) = msg else {
            warn!("leader connection closed");
            return;
        };

        {
            let mut clock = ctx.clock.lock().unwrap_or_else(|e| e.into_inner());
            clock.on_receive(ctx.self_id.load(Ordering::SeqCst), &msg.clock);
        }
        watchdog::note_fresh_message(&ctx);

        match msg.payload {
            LeaderPayload::AssignId { id } => {
                debug!(id, "assigned platoon position");
                ctx.self_id.store(id as usize, Ordering::SeqCst);
                ctx.state.lock().unwrap_or_else(|e| e.into_inner()).platoon_position = id;
            }
            LeaderPayload::Spawn { pos, dir, .. } => {
                let mut truck = ctx.truck.lock().unwrap_or_else(|e| e.into_inner());
                let mut state = ctx.state.lock().unwrap_or_else(|e| e.into_inner());
                if state.needs_spawn_snap {
                    truck.x = pos.0;
                    truck.y = pos.1;
                    truck.dir = dir;
                    state.needs_spawn_snap = false;
                    state.have_front_position = false;
                }
            }
            LeaderPayload::UpdateRear { has_rear, rear } => {
                let mut state = ctx.state.lock().unwrap_or_else(|e| e.into_inner());
                state.has_rear = has_rear;
                state.rear_address = rear.map(|w| w.to_net_info());
            }
            LeaderPayload::Cmd(cmd) => ctx.event_queue.push(Event::CruiseCmd(cmd)),
            LeaderPayload::EmergencyBrake => ctx.event_queue.push(Event::Emergency),
        }
    }
}

/// Reads UDP telemetry from the truck ahead until shutdown.
pub fn udp_reader(ctx: Arc<FollowerContext>) {
    let mut buf = [0u8; 512];
    loop {
        let (len, _peer) = match ctx.udp_socket.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(err) => {
                if ctx.shutdown.is_requested() {
                    return;
                }
                warn!(%err, "udp recv error");
                continue;
            }
        };
        let msg: FollowerMsg = match decode_datagram(&buf[..len]) {
            Ok(m) => m,
            Err(err) => {
                warn!(%err, "unrecognized udp datagram, ignoring");
                continue;
            }
        };

        {
            let mut clock = ctx.clock.lock().unwrap_or_else(|e| e.into_inner());
            clock.on_receive(ctx.self_id.load(Ordering::SeqCst), &msg.clock);
        }

        match msg.payload {
            FollowerPayload::Position { x, y, speed } => ctx.event_queue.push(Event::Distance { x, y, speed }),
            FollowerPayload::EmergencyBrake => ctx.event_queue.push(Event::Emergency),
            FollowerPayload::IntruderReport(_) | FollowerPayload::Unknown => {
                // Reserved for a future build; tolerated, not acted on.
            }
        }
    }
}

/// Send a message to the leader over TCP (intruder reports, peer-originated
/// emergency brakes).
pub fn send_to_leader(ctx: &FollowerContext, payload: FollowerPayload) {
    let clock = {
        let mut clock = ctx.clock.lock().unwrap_or_else(|e| e.into_inner());
        clock.on_send(ctx.self_id.load(Ordering::SeqCst));
        *clock
    };
    let mut guard = ctx.leader_stream.lock().unwrap_or_else(|e| e.into_inner());
    let Some(stream) = guard.as_mut() else {
        warn!("no leader connection, dropping outbound message");
        return;
    };
    if let Err(err) = write_frame(stream, &FollowerMsg { payload, clock }) {
        warn!(%err, "failed to write to leader");
    }
}

/// Forward a message to the rear-chain peer over UDP, if one is assigned.
pub fn forward_to_rear(ctx: &FollowerContext, payload: FollowerPayload) {
    let rear = ctx.state.lock().unwrap_or_else(|e| e.into_inner()).rear_address.clone();
    let Some(rear) = rear else { return };
    send_udp(ctx, &rear.ip, rear.udp_port, payload);
}

fn send_udp(ctx: &FollowerContext, ip: &str, port: u16, payload: FollowerPayload) {
    let addr: SocketAddr = match format!("{ip}:{port}").parse() {
        Ok(a) => a,
        Err(err) => {
            warn!(%err, ip, port, "invalid rear peer address");
            return;
        }
    };
    let clock = {
        let mut clock = ctx.clock.lock().unwrap_or_else(|e| e.into_inner());
        clock.on_send(ctx.self_id.load(Ordering::SeqCst));
        *clock
    };
    let bytes = match encode_datagram(&FollowerMsg { payload, clock }) {
        Ok(b) => b,
        Err(err) => {
            warn!(%err, "failed to encode udp datagram");
            return;
        }
    };
    if let Err(err) = ctx.udp_socket.send_to(&bytes, addr) {
        warn!(%err, %addr, "failed to forward udp datagram");
    }
}
