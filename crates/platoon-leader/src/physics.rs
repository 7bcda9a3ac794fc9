// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Leader tick producer (C10, leader half). Absolute-time scheduled,
//! decoupled from event processing: a saturated event queue never stalls
//! the wall-clock cadence, and the producer never blocks pushing its own
//! `Tick` — a full `Tick` ring just means this cycle's tick is dropped.
//! Grounded on `leader.c`'s main loop `nanosleep`/tick cadence.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::trace;

use platoon_core::events::Event;

use crate::context::LeaderContext;

pub fn tick_loop(ctx: Arc<LeaderContext>) {
    let dt = Duration::from_millis(ctx.config.tick_dt_ms);
    let mut next_deadline = Instant::now() + dt;
    let mut tick_count: u64 = 0;

    while !ctx.shutdown.is_requested() {
        let now = Instant::now();
        if now < next_deadline {
            std::thread::sleep(next_deadline - now);
        }
        next_deadline += dt;

        ctx.event_queue.push(Event::Tick);
        tick_count += 1;
        if tick_count % ctx.config.print_every_n == 0 {
            let truck = ctx.truck.lock().unwrap_or_else(|e| e.into_inner());
            trace!(x = truck.x, y = truck.y, speed = truck.speed, "leader tick");
        }
    }
}
