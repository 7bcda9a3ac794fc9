// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topology registry (C4): the leader's ordered set of active follower
//! sessions, with stable compaction and rear-chain wiring. Grounded on
//! `leader.c`'s `register_new_follower`, `compact_followers_locked`, and
//! `finalize_topology`.
//!
//! Every session also carries a `conn_id`, a monotonically issued handle
//! that is stable across compaction — unlike `id` (the 1-based platoon
//! position, which is re-derived from array position on every compaction),
//! `conn_id` is how a socket-owning thread refers back to its own session
//! after the registry has reshuffled positions under it.

use std::net::TcpStream;

use platoon_core::wire::NetInfo;

/// A single registered follower connection. Lives from TCP accept to
/// socket close or graceful shutdown; never moved in memory, only
/// relabeled (`id`) as the registry compacts around it.
pub struct FollowerSession {
    pub id: u32,
    pub conn_id: u64,
    pub stream: Option<TcpStream>,
    pub address: NetInfo,
    pub active: bool,
}

/// Outcome of [`Topology::register`].
pub enum RegisterOutcome {
    Assigned { id: u32, conn_id: u64 },
    /// Every slot is occupied by an active session.
    Full,
}

/// One entry of a [`Topology::finalize`] result: a follower's (possibly
/// new) id and the peer it should now forward UDP telemetry to.
#[derive(Debug, Clone)]
pub struct FinalizedFollower {
    pub conn_id: u64,
    pub id: u32,
    pub address: NetInfo,
    pub rear: Option<NetInfo>,
}

/// Ordered set of at most `capacity` active follower sessions. Invariant
/// (I3): outside a call to [`Topology::compact`], `{i : slots[i].active}`
/// is `{0,...,k-1}` for some `k`, and `slots[i].id == i+1` for all active
/// `i`.
pub struct Topology {
    slots: Vec<Option<FollowerSession>>,
    next_conn_id: u64,
}

impl Topology {
    pub fn new(capacity: usize) -> Self {
        Self { slots: (0..capacity).map(|_| None).collect(), next_conn_id: 1 }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| matches!(s, Some(fs) if fs.active)).count()
    }

    /// Compact active sessions into a contiguous prefix, dropping inactive
    /// ones permanently and re-deriving `id = index + 1`. Grounded on
    /// `compact_followers_locked`.
    fn compact(&mut self) {
        let mut actives: Vec<FollowerSession> = Vec::with_capacity(self.slots.len());
        for slot in self.slots.iter_mut() {
            if let Some(fs) = slot.take() {
                if fs.active {
                    actives.push(fs);
                }
            }
        }
        for (i, mut fs) in actives.into_iter().enumerate() {
            fs.id = (i + 1) as u32;
            self.slots[i] = Some(fs);
        }
    }

    /// Register a newly accepted connection. Compacts first so the new
    /// session occupies the lowest free slot.
    pub fn register(&mut self, stream: TcpStream, address: NetInfo) -> RegisterOutcome {
        self.compact();
        let idx = self.active_count();
        if idx >= self.slots.len() {
            return RegisterOutcome::Full;
        }
        let conn_id = self.next_conn_id;
        self.next_conn_id += 1;
        let id = (idx + 1) as u32;
        self.slots[idx] =
            Some(FollowerSession { id, conn_id, stream: Some(stream), address, active: true });
        RegisterOutcome::Assigned { id, conn_id }
    }

    /// Mark the session identified by `conn_id` inactive and drop its
    /// socket handle. Returns `true` if a matching active session was
    /// found.
    pub fn disconnect(&mut self, conn_id: u64) -> bool {
        for slot in self.slots.iter_mut().flatten() {
            if slot.conn_id == conn_id && slot.active {
                slot.active = false;
                slot.stream = None;
                return true;
            }
        }
        false
    }

    /// One-shot re-formation: compact to a prefix, reassign ids, and
    /// compute the fresh rear-chain wiring (each follower i's rear is
    /// follower i+1; the last has none). Grounded on `finalize_topology`.
    pub fn finalize(&mut self) -> Vec<FinalizedFollower> {
        self.compact();
        let n = self.active_count();
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let address = match &self.slots[i] {
                Some(fs) => fs.address.clone(),
                None => continue,
            };
            let conn_id = self.slots[i].as_ref().map(|fs| fs.conn_id).unwrap_or(0);
            let id = self.slots[i].as_ref().map(|fs| fs.id).unwrap_or(0);
            let rear = if i + 1 < n { self.slots[i + 1].as_ref().map(|fs| fs.address.clone()) } else { None };
            out.push(FinalizedFollower { conn_id, id, address, rear });
        }
        out
    }

    /// Invoke `f` for every active session's socket handle, under the
    /// registry's lock. A single failing send (the caller's concern, not
    /// this loop's) does not abort the iteration.
    pub fn broadcast(&mut self, mut f: impl FnMut(&mut FollowerSession)) {
        for slot in self.slots.iter_mut().flatten() {
            if slot.active {
                f(slot);
            }
        }
    }

    /// Look up a session's stream by `conn_id` for a one-off send (e.g. the
    /// `AssignId`/`Spawn` pair issued immediately at registration).
    pub fn with_session(&mut self, conn_id: u64, f: impl FnOnce(&mut FollowerSession)) {
        for slot in self.slots.iter_mut().flatten() {
            if slot.conn_id == conn_id {
                f(slot);
                return;
            }
        }
    }

    #[cfg(test)]
    pub fn active_ids(&self) -> Vec<u32> {
        self.slots.iter().flatten().filter(|fs| fs.active).map(|fs| fs.id).collect()
    }
}

#[cfg(test)]
#[path = "topology_tests.rs"]
mod tests;
