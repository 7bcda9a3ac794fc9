// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process end-to-end harness for the leader/follower binaries.
//!
//! Unlike a black-box harness that spawns the compiled binary as a
//! subprocess and pokes an HTTP health endpoint, there is no such endpoint
//! here: a leader and its followers are plain TCP/UDP peers. This harness
//! instead drives `platoon-leader`/`platoon-follower`'s public library
//! modules directly — the same worker functions each binary's own `main`
//! spawns, bound to real loopback sockets — and polls context state (FSM
//! truck state, topology membership) the way the black-box harness polls a
//! `/healthz` response.

use std::net::{TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use platoon_core::events::Event;
use platoon_follower::config::FollowerConfig;
use platoon_follower::context::FollowerContext;
use platoon_follower::{fsm as follower_fsm, net as follower_net, physics as follower_physics, watchdog};
use platoon_leader::config::LeaderConfig;
use platoon_leader::context::LeaderContext;
use platoon_leader::{fsm as leader_fsm, net as leader_net, physics as leader_physics};

/// Bind to an ephemeral port and hand back the number, dropping the
/// listener so the harness (not the OS) decides when the real one binds.
/// Good enough for a test process: nothing else here contends for ports.
pub fn free_tcp_port() -> anyhow::Result<u16> {
    Ok(TcpListener::bind("127.0.0.1:0")?.local_addr()?.port())
}

pub fn free_udp_port() -> anyhow::Result<u16> {
    Ok(UdpSocket::bind("127.0.0.1:0")?.local_addr()?.port())
}

/// Poll `cond` until it returns true or `timeout` elapses, sleeping briefly
/// between checks. Returns whether `cond` was ever observed true.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn test_leader_config(tcp_port: u16, min_followers: usize) -> LeaderConfig {
    LeaderConfig {
        tcp_port,
        bind_ip: "127.0.0.1".to_owned(),
        min_followers,
        max_followers: 5,
        target_gap: 10.0,
        intruder_length: 10,
        tick_dt_ms: 20,
        cmd_queue_size: 32,
        print_every_n: 1000,
        log_format: "text".to_owned(),
        log_level: "warn".to_owned(),
    }
}

fn test_follower_config(udp_port: u16, leader_port: u16) -> FollowerConfig {
    FollowerConfig {
        udp_port,
        leader_ip: "127.0.0.1".to_owned(),
        leader_port,
        udp_bind_ip: "127.0.0.1".to_owned(),
        target_gap: 10.0,
        phys_dt_ms: 20,
        watchdog_period_ms: 20,
        leader_rx_timeout_ms: 150,
        print_every_n: 1000,
        log_format: "text".to_owned(),
        log_level: "warn".to_owned(),
    }
}

/// A running leader, its worker threads, and everything needed to shut it
/// down cleanly at the end of a test.
pub struct RunningLeader {
    pub ctx: Arc<LeaderContext>,
    pub tcp_port: u16,
    accept: JoinHandle<()>,
    tick: JoinHandle<()>,
    sender: JoinHandle<()>,
    fsm: JoinHandle<()>,
}

impl RunningLeader {
    /// Bind a fresh TCP listener and start every leader-side worker thread,
    /// mirroring `platoon-leader`'s own `main` minus the keyboard listener
    /// and OS signal watcher (neither is meaningful inside a test process).
    pub fn spawn(min_followers: usize) -> anyhow::Result<Self> {
        let tcp_port = free_tcp_port()?;
        let config = test_leader_config(tcp_port, min_followers);
        let listener = TcpListener::bind(("127.0.0.1", tcp_port))?;
        let ctx = LeaderContext::new(config);

        let accept = {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || leader_net::accept_loop(ctx, listener))
        };
        let tick = {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || leader_physics::tick_loop(ctx))
        };
        let sender = {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || leader_net::command_sender_loop(ctx))
        };
        let fsm = {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || run_leader_fsm_loop(&ctx))
        };

        Ok(Self { ctx, tcp_port, accept, tick, sender, fsm })
    }

    pub fn active_follower_count(&self) -> usize {
        self.ctx.followers.lock().unwrap_or_else(|e| e.into_inner()).active_count()
    }

    pub fn is_formed(&self) -> bool {
        self.ctx.formation_complete.load(Ordering::SeqCst)
    }

    /// Request shutdown, unstick a blocked `accept()`, and join every
    /// worker thread. Consumes `self` so a test can't keep using a
    /// half-torn-down leader.
    pub fn shutdown(self) {
        self.ctx.event_queue.push(Event::Shutdown);
        self.ctx.shutdown.request();
        platoon_core::shutdown::unblock_accept(([127, 0, 0, 1], self.tcp_port).into());
        let _ = self.accept.join();
        let _ = self.tick.join();
        let _ = self.sender.join();
        let _ = self.fsm.join();
    }
}

/// A running follower and its worker threads.
pub struct RunningFollower {
    pub ctx: Arc<FollowerContext>,
    leader_reader: JoinHandle<()>,
    udp_reader: JoinHandle<()>,
    watchdog: JoinHandle<()>,
    physics: JoinHandle<()>,
    fsm: JoinHandle<()>,
}

impl RunningFollower {
    /// Connect to `leader_port`, register, and start every follower-side
    /// worker thread, mirroring `platoon-follower`'s own `main` minus the
    /// keyboard listener and OS signal watcher.
    pub fn connect(leader_port: u16) -> anyhow::Result<Self> {
        let udp_port = free_udp_port()?;
        let config = test_follower_config(udp_port, leader_port);
        let udp_socket = UdpSocket::bind(("127.0.0.1", udp_port))?;
        let ctx = FollowerContext::new(config, udp_socket);

        let leader_stream: TcpStream = follower_net::register_with_leader(&ctx)?;
        watchdog::note_fresh_message(&ctx);

        let leader_reader = {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || follower_net::leader_reader(ctx, leader_stream))
        };
        let udp_reader = {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || follower_net::udp_reader(ctx))
        };
        let watchdog_handle = {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || watchdog::run(ctx))
        };
        let physics = {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || follower_physics::physics_loop(ctx))
        };
        let fsm = {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || run_follower_fsm_loop(&ctx))
        };

        Ok(Self { ctx, leader_reader, udp_reader, watchdog: watchdog_handle, physics, fsm })
    }

    pub fn state(&self) -> platoon_core::wire::TruckState {
        self.ctx.truck.lock().unwrap_or_else(|e| e.into_inner()).state
    }

    pub fn speed(&self) -> f32 {
        self.ctx.truck.lock().unwrap_or_else(|e| e.into_inner()).speed
    }

    pub fn shutdown(self) {
        self.ctx.event_queue.push(Event::Shutdown);
        self.ctx.shutdown.request();
        let _ = self.leader_reader.join();
        let _ = self.udp_reader.join();
        let _ = self.watchdog.join();
        let _ = self.physics.join();
        let _ = self.fsm.join();
    }
}

/// Copy of `platoon-leader`'s own `main::run_fsm_loop`: consume events and
/// dispatch every effect until a `Shutdown` event is processed.
fn run_leader_fsm_loop(ctx: &Arc<LeaderContext>) {
    loop {
        let event = ctx.event_queue.pop();
        let is_shutdown = matches!(event, Event::Shutdown);
        let effects = leader_fsm::handle_event(ctx, event);
        for effect in effects {
            match effect {
                leader_fsm::Effect::Reform(finalized) => leader_net::apply_reform(ctx, finalized),
                leader_fsm::Effect::BroadcastCmd(cmd) => ctx.enqueue_cmd(cmd),
                leader_fsm::Effect::BroadcastEmergencyBrake => leader_net::broadcast_emergency_brake(ctx),
                leader_fsm::Effect::RequestShutdown => {
                    if ctx.shutdown.request() {
                        ctx.event_queue.push(Event::Shutdown);
                    }
                }
                leader_fsm::Effect::Hint(_) => {}
            }
        }
        if is_shutdown || ctx.shutdown.is_requested() {
            return;
        }
    }
}

/// Copy of `platoon-follower`'s own `main::run_fsm_loop`.
fn run_follower_fsm_loop(ctx: &Arc<FollowerContext>) {
    loop {
        let event = ctx.event_queue.pop();
        let is_shutdown = matches!(event, Event::Shutdown);
        let effects = follower_fsm::handle_event(ctx, event);
        for effect in effects {
            match effect {
                follower_fsm::Effect::NotifyLeaderIntruder(info) => {
                    follower_net::send_to_leader(ctx, platoon_core::wire::FollowerPayload::IntruderReport(info))
                }
                follower_fsm::Effect::ForwardEmergencyBrakeUdp => {
                    follower_net::forward_to_rear(ctx, platoon_core::wire::FollowerPayload::EmergencyBrake)
                }
                follower_fsm::Effect::ArmEmergencyTimer => ctx.arm_emergency_timer(),
                follower_fsm::Effect::RequestShutdown => {
                    if ctx.shutdown.request() {
                        ctx.event_queue.push(Event::Shutdown);
                    }
                }
            }
        }
        if is_shutdown || ctx.shutdown.is_requested() {
            return;
        }
    }
}
