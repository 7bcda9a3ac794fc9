// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Follower CLI surface, mirroring `platoon_leader::config::LeaderConfig`'s
//! shape.

use clap::Parser;
use platoon_core::config as defaults;

/// Truck platoon follower: registers with a leader, receives cruise
/// commands over TCP, and forwards telemetry down a UDP rear-chain.
#[derive(Debug, Parser)]
#[command(name = "follower", version, about)]
pub struct FollowerConfig {
    /// This follower's own UDP listening port (for telemetry from the
    /// truck ahead of it in the rear-chain).
    pub udp_port: u16,

    /// Leader's TCP rendezvous address.
    #[arg(long, default_value = defaults::DEFAULT_LEADER_IP, env = "PLATOON_LEADER_IP")]
    pub leader_ip: String,

    /// Leader's TCP port.
    #[arg(long, default_value_t = defaults::DEFAULT_LEADER_PORT, env = "PLATOON_LEADER_PORT")]
    pub leader_port: u16,

    /// Address this follower's UDP socket binds to.
    #[arg(long, default_value = "0.0.0.0", env = "PLATOON_UDP_BIND")]
    pub udp_bind_ip: String,

    /// Nominal longitudinal gap to the vehicle ahead.
    #[arg(long, default_value_t = defaults::TARGET_GAP, env = "PLATOON_TARGET_GAP")]
    pub target_gap: f32,

    /// Physics/control cadence, in milliseconds.
    #[arg(long, default_value_t = defaults::FOLLOWER_PHYS_DT.as_millis() as u64, env = "PLATOON_PHYS_DT_MS")]
    pub phys_dt_ms: u64,

    /// Leader-liveness watchdog poll period, in milliseconds.
    #[arg(long, default_value_t = defaults::WATCHDOG_PERIOD_MS, env = "PLATOON_WATCHDOG_PERIOD_MS")]
    pub watchdog_period_ms: u64,

    /// Leader-liveness staleness threshold, in milliseconds.
    #[arg(long, default_value_t = defaults::LEADER_RX_TIMEOUT_MS, env = "PLATOON_LEADER_RX_TIMEOUT_MS")]
    pub leader_rx_timeout_ms: u64,

    /// Status line decimation: trace a physics tick every Nth cycle.
    #[arg(long, default_value_t = defaults::FOLLOWER_PRINT_EVERY_N, env = "PLATOON_PRINT_EVERY_N")]
    pub print_every_n: u64,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "PLATOON_LOG_FORMAT")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "PLATOON_LOG_LEVEL")]
    pub log_level: String,
}

impl FollowerConfig {
    pub fn phys_dt_secs(&self) -> f32 {
        self.phys_dt_ms as f32 / 1000.0
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.udp_port != 0, "udp port must be nonzero");
        anyhow::ensure!(self.leader_port != 0, "leader port must be nonzero");
        anyhow::ensure!(self.target_gap > 0.0, "target_gap must be positive");
        anyhow::ensure!(
            self.leader_rx_timeout_ms > self.watchdog_period_ms,
            "leader_rx_timeout_ms must exceed watchdog_period_ms"
        );
        Ok(())
    }
}
