// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Randomized intruder generation and its self-expiring auto-clear timer.
//! Grounded on `intruder.c`'s `intruder_detected`/`intruder_speed`/
//! `intruder_length`/`intruder_duration` and `start_intruder_timer`.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::info;

use platoon_core::config::{
    INTRUDER_DURATION_MS_RANGE, INTRUDER_LENGTH_RANGE, INTRUDER_PROBABILITY_PCT, INTRUDER_SPEED_RANGE,
};
use platoon_core::events::Event;
use platoon_core::timers::TimerService;
use platoon_core::wire::{IntruderInfo, TruckState};

use crate::context::FollowerContext;

/// Roll a fresh intruder encounter, `INTRUDER_PROBABILITY_PCT` percent of
/// the time. Parameters are drawn uniformly from the same ranges as the
/// original generator.
pub fn maybe_generate() -> Option<IntruderInfo> {
    let mut rng = rand::rng();
    if rng.random_range(0..100) >= INTRUDER_PROBABILITY_PCT {
        return None;
    }
    Some(IntruderInfo {
        speed: rng.random_range(INTRUDER_SPEED_RANGE),
        length: rng.random_range(INTRUDER_LENGTH_RANGE),
        duration_ms: rng.random_range(INTRUDER_DURATION_MS_RANGE),
    })
}

/// The `i` keyboard handler: clears an active intruder outright, otherwise
/// rolls a fresh one and arms its auto-clear timer.
pub fn on_toggle(ctx: &Arc<FollowerContext>) {
    let currently_following = ctx.truck.lock().unwrap_or_else(|e| e.into_inner()).state == TruckState::IntruderFollow;
    if currently_following {
        ctx.event_queue.push(Event::IntruderClear);
        return;
    }
    if let Some(info) = maybe_generate() {
        trigger(ctx, info);
    } else {
        info!("intruder toggle rolled no encounter this time");
    }
}

/// Push `Intruder(info)` and arm a timer that posts `IntruderClear` after
/// `info.duration_ms`, unless a newer intruder has since superseded it.
pub fn trigger(ctx: &Arc<FollowerContext>, info: IntruderInfo) {
    let generation = ctx.intruder_generation.fetch_add(1, Ordering::SeqCst) + 1;
    ctx.event_queue.push(Event::Intruder(info));

    let ctx = Arc::clone(ctx);
    TimerService::schedule(Duration::from_millis(info.duration_ms as u64), move || {
        if ctx.intruder_generation.load(Ordering::SeqCst) == generation {
            ctx.event_queue.push(Event::IntruderClear);
        }
    });
}

#[cfg(test)]
#[path = "intruder_tests.rs"]
mod tests;
