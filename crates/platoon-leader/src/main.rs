// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use platoon_core::shutdown;
use platoon_leader::config::LeaderConfig;
use platoon_leader::context::LeaderContext;
use platoon_leader::{fsm, keyboard, net, physics};

fn init_tracing(config: &LeaderConfig) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn main() {
    let config = LeaderConfig::parse();
    init_tracing(&config);

    if let Err(err) = config.validate() {
        error!(%err, "invalid configuration");
        std::process::exit(2);
    }

    let bind_addr = format!("{}:{}", config.bind_ip, config.tcp_port);
    let listener = match TcpListener::bind(&bind_addr) {
        Ok(l) => l,
        Err(err) => {
            error!(%err, addr = %bind_addr, "failed to bind TCP listener");
            std::process::exit(1);
        }
    };
    info!(addr = %bind_addr, "leader listening");

    let ctx = LeaderContext::new(config);
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(err) => {
            error!(%err, "failed to read listener local address");
            std::process::exit(1);
        }
    };

    let signal_watcher = {
        let ctx = Arc::clone(&ctx);
        shutdown::spawn_os_signal_watcher_with(Arc::clone(&ctx.shutdown), Duration::from_millis(100), move || {
            ctx.event_queue.push(platoon_core::events::Event::Shutdown);
        })
    };

    let accept_handle = {
        let ctx = Arc::clone(&ctx);
        std::thread::spawn(move || net::accept_loop(ctx, listener))
    };
    let tick_handle = {
        let ctx = Arc::clone(&ctx);
        std::thread::spawn(move || physics::tick_loop(ctx))
    };
    let sender_handle = {
        let ctx = Arc::clone(&ctx);
        std::thread::spawn(move || net::command_sender_loop(ctx))
    };
    let keyboard_handle = {
        let ctx = Arc::clone(&ctx);
        std::thread::spawn(move || keyboard::listen(ctx))
    };

    run_fsm_loop(&ctx);

    ctx.shutdown.request();
    shutdown::unblock_accept(addr);
    let _ = accept_handle.join();
    let _ = tick_handle.join();
    let _ = sender_handle.join();
    let _ = keyboard_handle.join();
    let _ = signal_watcher.join();

    info!("leader shutdown complete");
}

/// Consume events until a `Shutdown` event is processed, dispatching every
/// effect the FSM produces. Runs on the main thread.
fn run_fsm_loop(ctx: &Arc<LeaderContext>) {
    loop {
        let event = ctx.event_queue.pop();
        let is_shutdown = matches!(event, platoon_core::events::Event::Shutdown);
        let effects = fsm::handle_event(ctx, event);
        for effect in effects {
            match effect {
                fsm::Effect::Reform(finalized) => net::apply_reform(ctx, finalized),
                fsm::Effect::BroadcastCmd(cmd) => ctx.enqueue_cmd(cmd),
                fsm::Effect::BroadcastEmergencyBrake => net::broadcast_emergency_brake(ctx),
                fsm::Effect::RequestShutdown => {
                    if ctx.shutdown.request() {
                        ctx.event_queue.push(platoon_core::events::Event::Shutdown);
                    }
                }
                fsm::Effect::Hint(msg) => info!(hint = msg),
            }
        }
        if is_shutdown || ctx.shutdown.is_requested() {
            return;
        }
    }
}
