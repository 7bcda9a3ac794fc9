// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types shared by both roles. Grounded on the struct layout in
//! `truckplatoon.h` (`Truck`, `NetInfo`, `LeaderCommand`, `IntruderInfo`,
//! `LD_MESSAGE`, `FT_MESSAGE`). Each envelope carries the sender's matrix
//! clock, encoded deterministically with `bincode` over `serde`-derived
//! types rather than the original's raw C struct layout.

use serde::{Deserialize, Serialize};

use crate::clock::MatrixClock;

/// Compass heading a truck is currently travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Rotate one quarter-turn left (counter-clockwise), as `'a'` does in
    /// the leader's keyboard handler.
    pub fn turn_left(self) -> Self {
        match self {
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
        }
    }

    /// Rotate one quarter-turn right (clockwise), as `'d'` does.
    pub fn turn_right(self) -> Self {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }
}

/// Per-role control state. The union of leader and follower states; a given
/// role only ever occupies the subset relevant to it (leader: Stopped,
/// Cruise, EmergencyBrake, IntruderFollow; follower: all five).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TruckState {
    Platooning,
    Cruise,
    IntruderFollow,
    EmergencyBrake,
    Stopped,
}

/// A truck's kinematic + control state. Owned exclusively by the node it
/// represents; cross-thread mutation is serialized under one mutex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Truck {
    pub x: f32,
    pub y: f32,
    pub speed: f32,
    pub dir: Direction,
    pub state: TruckState,
}

impl Truck {
    /// Euler-integrate position by `speed * dt` along `dir`. Grounded on
    /// `move_truck` in both `leader.c` and `follower.c`.
    pub fn integrate(&mut self, dt_secs: f32) {
        let delta = self.speed * dt_secs;
        match self.dir {
            Direction::North => self.y += delta,
            Direction::South => self.y -= delta,
            Direction::East => self.x += delta,
            Direction::West => self.x -= delta,
        }
    }
}

/// Network rendezvous info for a follower's UDP listener. Immutable once
/// assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetInfo {
    pub ip: String,
    pub udp_port: u16,
}

/// Periodic cruise command + heartbeat, also the implicit liveness signal
/// the follower's watchdog keys off of (command and heartbeat are unified
/// into one message type; see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeaderCommand {
    pub command_id: u64,
    pub leader: Truck,
    pub is_turning_event: bool,
    pub turn_point: (f32, f32),
    pub turn_dir: Direction,
}

/// An intruder vehicle's reported parameters. `speed == 0` is the sentinel
/// meaning "intruder cleared".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntruderInfo {
    pub speed: i32,
    pub length: i32,
    pub duration_ms: u32,
}

impl IntruderInfo {
    pub fn is_clear(&self) -> bool {
        self.speed == 0
    }

    pub fn clear() -> Self {
        Self::default()
    }
}

/// Messages the leader sends a follower over TCP.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LeaderPayload {
    AssignId { id: u32 },
    Spawn { id: u32, pos: (f32, f32), dir: Direction },
    UpdateRear { has_rear: bool, rear: Option<NetInfoWire> },
    Cmd(LeaderCommand),
    EmergencyBrake,
}

/// `NetInfo` is not `Copy` (it owns a `String`); this fixed-size wire
/// variant keeps `LeaderPayload` cheap to copy while still round-tripping
/// through bincode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetInfoWire {
    pub ip: [u8; 4],
    pub udp_port: u16,
}

impl NetInfoWire {
    pub fn from_net_info(info: &NetInfo) -> Self {
        let octets = info
            .ip
            .parse::<std::net::Ipv4Addr>()
            .unwrap_or(std::net::Ipv4Addr::LOCALHOST)
            .octets();
        Self { ip: octets, udp_port: info.udp_port }
    }

    pub fn to_net_info(self) -> NetInfo {
        let addr = std::net::Ipv4Addr::from(self.ip);
        NetInfo { ip: addr.to_string(), udp_port: self.udp_port }
    }
}

/// A leader->follower envelope, tagged record carrying the sender's matrix
/// clock alongside the payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeaderMsg {
    pub payload: LeaderPayload,
    pub clock: MatrixClock,
}

/// Messages a follower sends the leader (TCP) or its rear peer (UDP).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FollowerPayload {
    Position { x: f32, y: f32, speed: f32 },
    EmergencyBrake,
    IntruderReport(IntruderInfo),
    /// Reserved: receivers must tolerate tags a future build might add
    /// without this one recognizing them.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FollowerMsg {
    pub payload: FollowerPayload,
    pub clock: MatrixClock,
}

/// Registration message a follower sends the leader on initial TCP connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterMsg {
    pub self_address: NetInfo,
    pub clock: MatrixClock,
}

/// Encode a value as a length-prefixed bincode frame: a `u32` byte-length
/// header followed by the payload, so a stream reader knows exactly how
/// many bytes to pull off the socket before attempting to decode.
pub fn encode_framed<T: Serialize>(value: &T) -> Result<Vec<u8>, bincode::Error> {
    let body = bincode::serialize(value)?;
    let mut framed = Vec::with_capacity(4 + body.len());
    framed.extend_from_slice(&(body.len() as u32).to_be_bytes());
    framed.extend_from_slice(&body);
    Ok(framed)
}

pub fn decode_framed<T: for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T, bincode::Error> {
    bincode::deserialize(body)
}

/// Encode a value with no length prefix, for transports that already
/// preserve message boundaries (a UDP datagram).
pub fn encode_datagram<T: Serialize>(value: &T) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(value)
}

/// Decode a value from a whole, unframed datagram.
pub fn decode_datagram<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, bincode::Error> {
    bincode::deserialize(bytes)
}

/// Write a length-prefixed frame to any `Write`r (a TCP stream in practice).
pub fn write_frame<W: std::io::Write>(w: &mut W, value: &impl Serialize) -> std::io::Result<()> {
    let framed = encode_framed(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    w.write_all(&framed)
}

/// Read one length-prefixed frame from any `Read`er. Returns `Ok(None)` on
/// a clean EOF at a frame boundary (peer disconnect); any other failure,
/// including a truncated frame, is an error.
pub fn read_frame<R: std::io::Read>(r: &mut R) -> std::io::Result<Option<Vec<u8>>> {
    let mut header = [0u8; 4];
    match r.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u32::from_be_bytes(header) as usize;
    let mut body = vec![0u8; len];
    r.read_exact(&mut body)?;
    Ok(Some(body))
}

/// Read and decode one length-prefixed bincode frame. `Ok(None)` means the
/// peer disconnected cleanly at a frame boundary.
pub fn recv_framed<R: std::io::Read, T: for<'de> Deserialize<'de>>(
    r: &mut R,
) -> std::io::Result<Option<T>> {
    match read_frame(r)? {
        Some(body) => decode_framed(&body)
            .map(Some)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        None => Ok(None),
    }
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
