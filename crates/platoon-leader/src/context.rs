// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Leader-wide shared state, replacing the original's file-scope globals
//! (`leader.c`'s `g_leader_truck`, `g_followers[]`, `g_cmd_id`, ...) with an
//! explicit context struct handed to every worker thread by `Arc` clone.
//!
//! Field order mirrors the lock acquisition hierarchy:
//! `leader_state -> followers -> cmd_queue -> event_queue`. No code path may
//! acquire `followers` while already holding `truck`'s lock and then go on
//! to acquire a lock further up this list out of order.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use platoon_core::clock::MatrixClock;
use platoon_core::events::EventQueue;
use platoon_core::shutdown::ShutdownLatch;
use platoon_core::wire::{Direction, LeaderCommand, Truck, TruckState};

use crate::config::LeaderConfig;
use crate::topology::Topology;

/// A queued turn request from the keyboard ('a'/'d'), applied on the next
/// `Tick`.
#[derive(Debug, Clone, Copy)]
pub struct PendingTurn {
    pub dir: Direction,
}

pub struct LeaderContext {
    pub config: LeaderConfig,

    /// The leader's own kinematic + control state. The physics/FSM thread
    /// is the sole writer; other threads only ever read a snapshot.
    pub truck: Mutex<Truck>,

    /// Follower registry: ordered, compacting, rear-chain aware.
    pub followers: Mutex<Topology>,

    /// Outbound command ring, drained by the TCP broadcaster thread. The
    /// sender blocks on `cmd_queue_cv` until a command is queued, rather
    /// than polling.
    pub cmd_queue: Mutex<std::collections::VecDeque<LeaderCommand>>,
    pub cmd_queue_cv: Condvar,

    /// Priority event queue feeding the leader FSM thread.
    pub event_queue: Arc<EventQueue>,

    pub clock: Mutex<MatrixClock>,
    pub shutdown: Arc<ShutdownLatch>,

    pub cmd_id: AtomicU64,
    pub stale_mode: AtomicBool,
    pub formation_complete: AtomicBool,
    pub pending_turn: Mutex<Option<PendingTurn>>,
    pub leader_intruder_length: AtomicI32,
}

impl LeaderContext {
    pub fn new(config: LeaderConfig) -> Arc<Self> {
        let max_followers = config.max_followers;
        Arc::new(Self {
            truck: Mutex::new(Truck {
                x: 0.0,
                y: 0.0,
                speed: 0.0,
                dir: Direction::North,
                state: TruckState::Stopped,
            }),
            followers: Mutex::new(Topology::new(max_followers)),
            cmd_queue: Mutex::new(std::collections::VecDeque::with_capacity(
                config.cmd_queue_size,
            )),
            cmd_queue_cv: Condvar::new(),
            event_queue: Arc::new(EventQueue::new()),
            clock: Mutex::new(MatrixClock::new()),
            shutdown: ShutdownLatch::new(),
            cmd_id: AtomicU64::new(0),
            stale_mode: AtomicBool::new(false),
            formation_complete: AtomicBool::new(false),
            pending_turn: Mutex::new(None),
            leader_intruder_length: AtomicI32::new(0),
            config,
        })
    }

    /// Allocate the next strictly-increasing command id (I4).
    pub fn next_cmd_id(&self) -> u64 {
        self.cmd_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1
    }

    /// Enqueue `cmd` for broadcast; drop (and log) if the ring is already
    /// at `cmd_queue_size` capacity — no retransmit.
    pub fn enqueue_cmd(&self, cmd: LeaderCommand) {
        let mut q = self.cmd_queue.lock().unwrap_or_else(|e| e.into_inner());
        if q.len() >= self.config.cmd_queue_size {
            tracing::warn!(command_id = cmd.command_id, "command ring full, dropping command");
            return;
        }
        q.push_back(cmd);
        drop(q);
        self.cmd_queue_cv.notify_one();
    }

    /// Block until a command is queued or `timeout` elapses, then pop it.
    /// The TCP sender thread's blocking point (§5); also woken by
    /// [`Self::enqueue_cmd`] and polled periodically so it can still notice
    /// a shutdown request with no command pending.
    pub fn pop_cmd_timeout(&self, timeout: Duration) -> Option<LeaderCommand> {
        let mut q = self.cmd_queue.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cmd) = q.pop_front() {
            return Some(cmd);
        }
        let (mut q2, _timeout_result) =
            self.cmd_queue_cv.wait_timeout(q, timeout).unwrap_or_else(|e| e.into_inner());
        q2.pop_front()
    }
}
