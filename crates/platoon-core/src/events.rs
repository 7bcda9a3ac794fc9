// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Priority event queue (C2): one bounded ring per priority level, strict
//! priority pop, non-blocking push. Grounded on `event.h`/`project4/event.c`
//! (`EventQueue`, `push_event`, `pop_event`), generalized to replace the C
//! ring array with an explicit per-level structure rather than a raw union.
//!
//! Unlike the C source (which built one `EventQueue` flavor per role), this
//! module defines a single [`Event`] enum spanning every priority level so
//! leader and follower share one queue implementation; each role only ever
//! constructs the variants relevant to it.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use tracing::warn;

use crate::config::MAX_EVENTS;
use crate::wire::{FollowerMsg, IntruderInfo, LeaderCommand};

/// Number of distinct priority levels (0 = most urgent .. 11 = least).
pub const NUM_PRIORITIES: usize = 12;

/// A wrapped follower-originated message, tagged with the sending
/// follower's platoon position, as pushed by the leader's receiver thread.
#[derive(Debug, Clone, Copy)]
pub struct FollowerMsgEvent {
    pub follower_id: u32,
    pub msg: FollowerMsg,
}

/// Every event the coordination kernel can schedule, ordered by priority
/// (the discriminant IS the priority level — see [`Event::priority`]).
#[derive(Debug, Clone, Copy)]
pub enum Event {
    Emergency,
    LeaderTimeout,
    Intruder(IntruderInfo),
    Distance { x: f32, y: f32, speed: f32 },
    CruiseCmd(LeaderCommand),
    IntruderClear,
    EmergencyTimer,
    Tick,
    UserInput(char),
    FollowerMsg(FollowerMsgEvent),
    PlatoonFormed,
    Shutdown,
}

impl Event {
    /// Priority level (0 = most urgent).
    pub fn priority(&self) -> usize {
        match self {
            Event::Emergency => 0,
            Event::LeaderTimeout => 1,
            Event::Intruder(_) => 2,
            Event::Distance { .. } => 3,
            Event::CruiseCmd(_) => 4,
            Event::IntruderClear => 5,
            Event::EmergencyTimer => 6,
            Event::Tick => 7,
            Event::UserInput(_) => 8,
            Event::FollowerMsg(_) => 9,
            Event::PlatoonFormed => 10,
            Event::Shutdown => 11,
        }
    }
}

struct Inner {
    rings: [VecDeque<Event>; NUM_PRIORITIES],
}

/// Multi-producer, single-consumer priority queue. `push` never blocks;
/// `pop` blocks until any ring is non-empty, then returns from the
/// lowest-numbered non-empty ring (strict priority, FIFO within a level).
pub struct EventQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                rings: std::array::from_fn(|_| VecDeque::with_capacity(MAX_EVENTS)),
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Push `event`. If its priority level's ring is already at capacity
    /// the push is dropped and a warning is logged (I2); the producer is
    /// never blocked.
    pub fn push(&self, event: Event) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let level = event.priority();
        let ring = &mut inner.rings[level];
        if ring.len() >= MAX_EVENTS {
            warn!(priority = level, "event queue full, dropping event");
            return;
        }
        ring.push_back(event);
        drop(inner);
        self.not_empty.notify_all();
    }

    /// Block until an event is available, then return the highest-priority
    /// one (I1). Ties within a level resolve FIFO.
    pub fn pop(&self) -> Event {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            for ring in inner.rings.iter_mut() {
                if let Some(event) = ring.pop_front() {
                    return event;
                }
            }
            inner = self
                .not_empty
                .wait(inner)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Like [`Self::pop`] but gives up after `timeout`, returning `None`.
    /// Used by polling-style consumers that also need to check a shutdown
    /// flag between waits.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Event> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let deadline = std::time::Instant::now() + timeout;
        loop {
            for ring in inner.rings.iter_mut() {
                if let Some(event) = ring.pop_front() {
                    return Some(event);
                }
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, timeout_result) = self
                .not_empty
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            inner = guard;
            if timeout_result.timed_out() {
                // Fall through to the loop head once more in case an event
                // was pushed in the instant between timing out and the
                // mutex re-acquire.
                for ring in inner.rings.iter_mut() {
                    if let Some(event) = ring.pop_front() {
                        return Some(event);
                    }
                }
                return None;
            }
        }
    }

    /// Count of pending events at or below (more urgent than or equal to)
    /// the given priority level, used by tests to assert I1/I2/I6 without
    /// racing `pop`.
    #[cfg(test)]
    pub fn len_at(&self, level: usize) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).rings[level].len()
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
