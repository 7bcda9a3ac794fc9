// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Follower-wide shared state, the counterpart of
//! `platoon_leader::context::LeaderContext`. Field order follows the lock
//! hierarchy: `follower_state -> sockets -> leader_rx -> event_queue`
//! (there is no `topology` lock on the follower side — rear chain
//! membership is a single `NetInfo`, not a registry).

use std::net::{TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use platoon_core::clock::MatrixClock;
use platoon_core::config::EMERGENCY_BRAKE_DURATION;
use platoon_core::events::{Event, EventQueue};
use platoon_core::shutdown::ShutdownLatch;
use platoon_core::timers::TimerService;
use platoon_core::turn::TurnQueue;
use platoon_core::wire::{Direction, IntruderInfo, NetInfo, Truck, TruckState};

use crate::config::FollowerConfig;

/// Mutable control-plane state the longitudinal controller and FSM
/// consult and update every tick. Grouped so the follower's single
/// "follower_state" lock maps onto one `Mutex`.
pub struct FollowerState {
    pub front_ref: Truck,
    pub leader_base_speed: f32,
    pub platoon_position: u32,
    pub has_rear: bool,
    pub rear_address: Option<NetInfo>,
    pub current_intruder: IntruderInfo,
    pub current_target_gap: f32,
    pub needs_spawn_snap: bool,
    pub have_front_position: bool,
    pub turn_queue: TurnQueue,
}

impl Default for FollowerState {
    fn default() -> Self {
        Self {
            front_ref: Truck { x: 0.0, y: 0.0, speed: 0.0, dir: Direction::North, state: TruckState::Stopped },
            leader_base_speed: 0.0,
            platoon_position: 0,
            has_rear: false,
            rear_address: None,
            current_intruder: IntruderInfo::clear(),
            current_target_gap: 0.0,
            needs_spawn_snap: true,
            have_front_position: false,
            turn_queue: TurnQueue::new(),
        }
    }
}

pub struct FollowerContext {
    pub config: FollowerConfig,

    /// This follower's own kinematic + control state. The physics thread
    /// is the sole writer.
    pub truck: Mutex<Truck>,
    pub state: Mutex<FollowerState>,

    /// The TCP connection to the leader, `None` before registration
    /// completes or after it drops.
    pub leader_stream: Mutex<Option<TcpStream>>,
    /// This follower's own UDP socket: receives from the truck ahead,
    /// sends to `state.rear_address` when `has_rear`.
    pub udp_socket: UdpSocket,

    pub last_leader_rx_ms: AtomicU64,
    pub timeout_emitted: AtomicBool,

    /// Matrix-clock row/column this node occupies. Unknown until the
    /// leader's first `AssignId`; defaults to the last slot so clock
    /// bookkeeping is always well-defined even pre-assignment.
    pub self_id: AtomicUsize,

    pub clock: Mutex<MatrixClock>,
    pub event_queue: Arc<EventQueue>,
    pub shutdown: Arc<ShutdownLatch>,

    /// Intruder-auto-clear timer generation: bumped on every new intruder
    /// so a stale timer callback (see `platoon_core::timers`) can tell it
    /// has been superseded before posting `IntruderClear`.
    pub intruder_generation: AtomicU64,
    /// Emergency-brake timer generation, same pattern.
    pub brake_generation: AtomicU64,
}

impl FollowerContext {
    pub fn new(config: FollowerConfig, udp_socket: UdpSocket) -> Arc<Self> {
        Arc::new(Self {
            truck: Mutex::new(Truck {
                x: 0.0,
                y: 0.0,
                speed: 0.0,
                dir: Direction::North,
                state: TruckState::Platooning,
            }),
            state: Mutex::new(FollowerState::default()),
            leader_stream: Mutex::new(None),
            udp_socket,
            last_leader_rx_ms: AtomicU64::new(0),
            timeout_emitted: AtomicBool::new(false),
            self_id: AtomicUsize::new(platoon_core::config::NUM_TRUCKS - 1),
            clock: Mutex::new(MatrixClock::new()),
            event_queue: Arc::new(EventQueue::new()),
            shutdown: ShutdownLatch::new(),
            intruder_generation: AtomicU64::new(0),
            brake_generation: AtomicU64::new(0),
            config,
        })
    }

    pub fn now_ms() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
    }

    /// Arm the emergency-brake auto-release timer: after
    /// [`EMERGENCY_BRAKE_DURATION`], push one `EmergencyTimer` event, unless
    /// a newer brake (or a clean recovery) has since bumped the generation.
    pub fn arm_emergency_timer(self: &Arc<Self>) {
        let generation = self.brake_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let ctx = Arc::clone(self);
        TimerService::schedule(EMERGENCY_BRAKE_DURATION, move || {
            if ctx.brake_generation.load(Ordering::SeqCst) == generation {
                ctx.event_queue.push(Event::EmergencyTimer);
            }
        });
    }
}
