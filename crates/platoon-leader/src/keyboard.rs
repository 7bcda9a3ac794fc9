// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw-mode keyboard listener: reads one byte at a time from stdin and
//! hands it to the event queue as `Event::UserInput`, leaving command
//! parsing entirely to the FSM. Built on `nix::sys::termios` for raw-mode
//! toggling, the same crate used elsewhere in this workspace for PTY/
//! terminal control.

use std::io::{self, Read};
use std::sync::Arc;

use nix::sys::termios::{self, SetArg};
use tracing::warn;

use platoon_core::events::Event;

use crate::context::LeaderContext;

/// Put stdin into raw mode (no line buffering, no echo) for the duration of
/// the returned guard, restoring the original settings on drop. Holds its
/// own `Stdin` handle so the safe `AsFd` impl (not a raw fd literal) is
/// what `tcgetattr`/`tcsetattr` borrow.
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

/// Read stdin one byte at a time until shutdown, pushing each as
/// `Event::UserInput`. Controls: `w/s` accel/decel, `a/d` turn, space =
/// emergency brake, `p` = toggle stale mode, `q` = quit.
pub fn listen(ctx: Arc<LeaderContext>) {
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
            Ok(_) => ctx.event_queue.push(Event::UserInput(byte[0] as char)),
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
