// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot timer service. Grounded on `intruder.c`'s
//! `start_intruder_timer`/`intruder_timer_thread` pattern (spawn a detached
//! thread that sleeps then pushes exactly one event), generalized so the
//! follower's emergency-brake and intruder-clear timers share one
//! implementation instead of each hand-rolling its own detached thread.

use std::thread;
use std::time::Duration;

/// Schedules a single callback to run once, after `delay`, on its own
/// thread. Cancellation isn't supported — matching the original, a fired
/// timer's callback always runs; callers that need "unless superseded"
/// semantics (the emergency-brake timer, the intruder auto-clear timer)
/// tag the scheduling generation and have the callback check it's still
/// current before acting.
pub struct TimerService;

impl TimerService {
    /// Run `callback` once, `delay` from now, on a dedicated thread.
    pub fn schedule<F>(delay: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        thread::spawn(move || {
            thread::sleep(delay);
            callback();
        });
    }
}

#[cfg(test)]
#[path = "timers_tests.rs"]
mod tests;
