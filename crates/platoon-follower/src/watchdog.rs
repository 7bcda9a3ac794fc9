// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Leader-liveness watchdog (C9). Grounded on `follower.c`'s
//! `leader_rx_watchdog`: a background timer that wakes every
//! `WATCHDOG_PERIOD_MS`, compares the clock against the last fresh leader
//! message, and emits at most one `LeaderTimeout` event per stale period.
//!
//! The decision logic is split out as a pure function ([`evaluate`]) so it
//! can be unit tested without a real clock or thread; [`run`] is the thin
//! wall-clock loop that calls it.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use platoon_core::events::Event;
use platoon_core::wire::TruckState;

use crate::context::FollowerContext;

/// What the watchdog should do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Leader is silent long enough and no event has been emitted for this
    /// stale period yet: emit `LeaderTimeout`.
    EmitTimeout,
    /// Nothing to do: leader is fresh, the follower is `Platooning`
    /// (watchdog muted), or a timeout was already emitted this period.
    None,
}

/// Pure decision function (I6, I7). `current_state == Platooning` mutes the
/// watchdog entirely — the leader may legitimately be silent while a
/// formation is still assembling.
pub fn evaluate(
    now_ms: u64,
    last_rx_ms: u64,
    timeout_ms: u64,
    current_state: TruckState,
    timeout_already_emitted: bool,
) -> Action {
    if current_state == TruckState::Platooning {
        return Action::None;
    }
    if timeout_already_emitted {
        return Action::None;
    }
    if now_ms.saturating_sub(last_rx_ms) > timeout_ms {
        Action::EmitTimeout
    } else {
        Action::None
    }
}

/// Record a fresh leader message: update `last_leader_rx_ms` and clear
/// `timeout_emitted` so the next stale period can emit again.
pub fn note_fresh_message(ctx: &FollowerContext) {
    ctx.last_leader_rx_ms.store(FollowerContext::now_ms(), Ordering::SeqCst);
    ctx.timeout_emitted.store(false, Ordering::SeqCst);
}

/// Background poll loop. Runs until shutdown.
pub fn run(ctx: Arc<FollowerContext>) {
    let period = Duration::from_millis(ctx.config.watchdog_period_ms);
    while !ctx.shutdown.is_requested() {
        std::thread::sleep(period);

        let current_state = ctx.truck.lock().unwrap_or_else(|e| e.into_inner()).state;
        let action = evaluate(
            FollowerContext::now_ms(),
            ctx.last_leader_rx_ms.load(Ordering::SeqCst),
            ctx.config.leader_rx_timeout_ms,
            current_state,
            ctx.timeout_emitted.load(Ordering::SeqCst),
        );
        if action == Action::EmitTimeout {
            ctx.timeout_emitted.store(true, Ordering::SeqCst);
            ctx.event_queue.push(Event::LeaderTimeout);
        }
    }
}

#[cfg(test)]
#[path = "watchdog_tests.rs"]
mod tests;
