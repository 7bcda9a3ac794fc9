// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw-mode keyboard listener, the follower counterpart of
//! `platoon_leader::keyboard`: reads one byte at a time and acts on it
//! directly — the follower side has no generic `UserInput` event, each key
//! maps straight to the event it drives.

use std::io::{self, Read};
use std::sync::Arc;

use nix::sys::termios::{self, SetArg};
use tracing::warn;

use platoon_core::events::Event;

use crate::context::FollowerContext;
use crate::intruder;

struct RawModeGuard {
    stdin: io::Stdin,
    original: termios::Termios,
}

impl RawModeGuard {
    fn enable() -> nix::Result<Self> {
        let stdin = io::stdin();
        let original = termios::tcgetattr(&stdin)?;
        let mut raw = original.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(&stdin, SetArg::TCSANOW, &raw)?;
        Ok(Self { stdin, original })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = termios::tcsetattr(&self.stdin, SetArg::TCSANOW, &self.original);
    }
}

/// Read stdin one byte at a time until shutdown. Controls: `i` toggle
/// intruder, `e` emergency, `q` quit.
pub fn listen(ctx: Arc<FollowerContext>) {
    let _guard = match RawModeGuard::enable() {
        Ok(g) => g,
        Err(err) => {
            warn!(%err, "failed to enable raw terminal mode, keyboard input disabled");
            return;
        }
    };

    let mut stdin = std::io::stdin();
    let mut byte = [0u8; 1];
    while !ctx.shutdown.is_requested() {
        match stdin.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => dispatch(&ctx, byte[0] as char),
            Err(err) => {
                if ctx.shutdown.is_requested() {
                    break;
                }
                warn!(%err, "stdin read error");
                break;
            }
        }
    }
}

fn dispatch(ctx: &Arc<FollowerContext>, c: char) {
    match c {
        'i' => intruder::on_toggle(ctx),
        'e' => ctx.event_queue.push(Event::Emergency),
        'q' => ctx.event_queue.push(Event::Shutdown),
        _ => {}
    }
}
