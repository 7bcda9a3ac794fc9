// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graceful shutdown (C11): an idempotent latch that both roles' main
//! threads wait on, plus the OS signal plumbing that trips it. Grounded on
//! `leader_on_signal`/`follower_on_signal` (`sigaction` on SIGINT/SIGTERM in
//! `leader.c`/`follower.c`) and `*_request_shutdown`/`*_close_all_sockets`.
//!
//! The raw signal handler only flips an atomic flag; a dedicated watcher
//! thread polls it and performs the actual coordinated shutdown (taking
//! locks, notifying condvars, pushing events), none of which is safe to do
//! directly inside a signal handler.

use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nix::sys::signal::{self, SigHandler, Signal};
use tracing::info;

static OS_SIGNAL_RECEIVED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_os_signal(_signo: nix::libc::c_int) {
    OS_SIGNAL_RECEIVED.store(true, Ordering::SeqCst);
}

/// Install handlers for SIGINT and SIGTERM that record the signal without
/// doing any non-async-signal-safe work.
#[allow(unsafe_code)]
pub fn install_os_signal_handlers() -> nix::Result<()> {
    // SAFETY: the handler body only performs an atomic store, which is
    // async-signal-safe; it takes no locks and allocates nothing.
    unsafe {
        signal::signal(Signal::SIGINT, SigHandler::Handler(on_os_signal))?;
        signal::signal(Signal::SIGTERM, SigHandler::Handler(on_os_signal))?;
    }
    Ok(())
}

/// One-shot idempotent shutdown coordination point, shared by every thread
/// in a leader or follower process.
#[derive(Default)]
pub struct ShutdownLatch {
    requested: Mutex<bool>,
    cv: Condvar,
}

impl ShutdownLatch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Trip the latch. Returns `true` the first time it's called; later
    /// calls are no-ops that return `false`, so every caller path (keyboard
    /// 'q', OS signal, a peer disconnect worth tearing down for) can call
    /// this unconditionally without double-running teardown logic.
    pub fn request(&self) -> bool {
        let mut guard = self.requested.lock().unwrap_or_else(|e| e.into_inner());
        if *guard {
            return false;
        }
        *guard = true;
        self.cv.notify_all();
        true
    }

    pub fn is_requested(&self) -> bool {
        *self.requested.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block the calling thread until [`Self::request`] has been called.
    pub fn wait(&self) {
        let guard = self.requested.lock().unwrap_or_else(|e| e.into_inner());
        let _unused = self
            .cv
            .wait_while(guard, |requested| !*requested)
            .unwrap_or_else(|e| e.into_inner());
    }
}

/// Spawn a background thread that installs the OS signal handlers and trips
/// `latch` the first time SIGINT or SIGTERM arrives. Returns the join
/// handle; the thread exits once the latch is tripped by any path.
pub fn spawn_os_signal_watcher(latch: Arc<ShutdownLatch>, poll_period: Duration) -> JoinHandle<()> {
    spawn_os_signal_watcher_with(latch, poll_period, || {})
}

/// Like [`spawn_os_signal_watcher`], but also runs `on_trip` the moment this
/// watcher is the one that actually trips the latch. Every role's `main`
/// passes a closure here that pushes `Event::Shutdown` onto its own event
/// queue, since a signal landing while the FSM thread is blocked in
/// `pop_event` would otherwise go unnoticed until the next unrelated event
/// (§4.11 step 2: "pushes a Shutdown event, which wakes any pop-blocked
/// FSM").
pub fn spawn_os_signal_watcher_with<F>(
    latch: Arc<ShutdownLatch>,
    poll_period: Duration,
    on_trip: F,
) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::spawn(move || {
        if let Err(err) = install_os_signal_handlers() {
            tracing::warn!(%err, "failed to install OS signal handlers");
            return;
        }
        loop {
            if latch.is_requested() {
                return;
            }
            if OS_SIGNAL_RECEIVED.swap(false, Ordering::SeqCst) {
                info!("shutdown requested via OS signal");
                if latch.request() {
                    on_trip();
                }
                return;
            }
            thread::sleep(poll_period);
        }
    })
}

/// A thread blocked in `TcpListener::accept` on `addr` can't be interrupted
/// by dropping the listener from another thread; the standard trick is to
/// connect to it once so `accept` returns and the accept loop can observe
/// the shutdown latch and exit on its own. Errors are ignored: if the
/// listener is already gone there's nothing left to unblock.
pub fn unblock_accept(addr: SocketAddr) {
    let _ = TcpStream::connect_timeout(&addr, Duration::from_millis(200));
}
