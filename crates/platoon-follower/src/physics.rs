// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Follower physics loop (C10, follower half). Absolute-time scheduled,
//! decoupled from event processing. Grounded on `follower.c`'s
//! `move_truck`/turning-check cadence.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::trace;

use platoon_core::wire::{FollowerPayload, TruckState};

use crate::context::FollowerContext;
use crate::net;

pub fn physics_loop(ctx: Arc<FollowerContext>) {
    let dt = Duration::from_millis(ctx.config.phys_dt_ms);
    let mut next_deadline = Instant::now() + dt;
    let mut tick_count: u64 = 0;

    while !ctx.shutdown.is_requested() {
        let now = Instant::now();
        if now < next_deadline {
            std::thread::sleep(next_deadline - now);
        }
        next_deadline += dt;

        let (x, y, speed) = step(&ctx, dt);
        net::forward_to_rear(&ctx, FollowerPayload::Position { x, y, speed });

        tick_count += 1;
        if tick_count % ctx.config.print_every_n == 0 {
            trace!(x, y, speed, "follower tick");
        }
    }
}

/// One physics step: integrate position, then consult the turn queue.
/// Returns the post-step pose for the caller to broadcast.
fn step(ctx: &FollowerContext, dt: Duration) -> (f32, f32, f32) {
    let mut truck = ctx.truck.lock().unwrap_or_else(|e| e.into_inner());
    if truck.state == TruckState::Stopped {
        truck.speed = 0.0;
    }
    truck.integrate(dt.as_secs_f32());

    let mut state = ctx.state.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(wp) = state.turn_queue.check_and_update(truck.x, truck.y, truck.dir) {
        truck.x = wp.x;
        truck.y = wp.y;
        truck.dir = wp.dir;
        drop(state);
        let mut clock = ctx.clock.lock().unwrap_or_else(|e| e.into_inner());
        clock.local_tick(ctx.self_id.load(Ordering::SeqCst));
    }

    (truck.x, truck.y, truck.speed)
}
