// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use platoon_core::shutdown;
use platoon_follower::config::FollowerConfig;
use platoon_follower::context::FollowerContext;
use platoon_follower::{fsm, keyboard, net, physics, watchdog};

fn init_tracing(config: &FollowerConfig) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn main() {
    let config = FollowerConfig::parse();
    init_tracing(&config);

    if let Err(err) = config.validate() {
        error!(%err, "invalid configuration");
        std::process::exit(2);
    }

    let udp_addr = format!("{}:{}", config.udp_bind_ip, config.udp_port);
    let udp_socket = match UdpSocket::bind(&udp_addr) {
        Ok(s) => s,
        Err(err) => {
            error!(%err, addr = %udp_addr, "failed to bind UDP socket");
            std::process::exit(1);
        }
    };
    info!(addr = %udp_addr, "follower udp listening");

    let ctx = FollowerContext::new(config, udp_socket);

    let leader_stream = match net::register_with_leader(&ctx) {
        Ok(s) => s,
        Err(err) => {
            error!(%err, "failed to register with leader");
            std::process::exit(1);
        }
    };
    watchdog::note_fresh_message(&ctx);

    let signal_watcher = {
        let ctx = Arc::clone(&ctx);
        shutdown::spawn_os_signal_watcher_with(Arc::clone(&ctx.shutdown), Duration::from_millis(100), move || {
            ctx.event_queue.push(platoon_core::events::Event::Shutdown);
        })
    };

    {
        let ctx = Arc::clone(&ctx);
        std::thread::spawn(move || net::leader_reader(ctx, leader_stream));
    }
    {
        let ctx = Arc::clone(&ctx);
        std::thread::spawn(move || net::udp_reader(ctx));
    }
    let watchdog_handle = {
        let ctx = Arc::clone(&ctx);
        std::thread::spawn(move || watchdog::run(ctx))
    };
    let physics_handle = {
        let ctx = Arc::clone(&ctx);
        std::thread::spawn(move || physics::physics_loop(ctx))
    };
    let keyboard_handle = {
        let ctx = Arc::clone(&ctx);
        std::thread::spawn(move || keyboard::listen(ctx))
    };

    run_fsm_loop(&ctx);

    ctx.shutdown.request();
    let _ = watchdog_handle.join();
    let _ = physics_handle.join();
    let _ = keyboard_handle.join();
    let _ = signal_watcher.join();

    info!("follower shutdown complete");
}

/// Consume events until a `Shutdown` event is processed, dispatching every
/// effect the FSM produces. Runs on the main thread. The leader-TCP and
/// rear-chain-UDP reader threads aren't joined here: like the leader's own
/// per-connection readers, they're expected to unwind on their own via a
/// read error or EOF, and the process exiting tears down any still blocked
/// in a socket read.
fn run_fsm_loop(ctx: &Arc<FollowerContext>) {
    loop {
        let event = ctx.event_queue.pop();
        let is_shutdown = matches!(event, platoon_core::events::Event::Shutdown);
        let effects = fsm::handle_event(ctx, event);
        for effect in effects {
            match effect {
                fsm::Effect::NotifyLeaderIntruder(info) => {
                    net::send_to_leader(ctx, platoon_core::wire::FollowerPayload::IntruderReport(info))
                }
                fsm::Effect::ForwardEmergencyBrakeUdp => {
                    net::forward_to_rear(ctx, platoon_core::wire::FollowerPayload::EmergencyBrake)
                }
                fsm::Effect::ArmEmergencyTimer => ctx.arm_emergency_timer(),
                fsm::Effect::RequestShutdown => {
                    if ctx.shutdown.request() {
                        ctx.event_queue.push(platoon_core::events::Event::Shutdown);
                    }
                }
            }
        }
        if is_shutdown || ctx.shutdown.is_requested() {
            return;
        }
    }
}
