// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Leader CLI surface. Every tunable is overridable here with an `env`
//! fallback.

use clap::Parser;
use platoon_core::config as defaults;

/// Truck platoon leader: accepts follower registrations, assigns platoon
/// positions, and broadcasts cruise commands.
#[derive(Debug, Parser)]
#[command(name = "leader", version, about)]
pub struct LeaderConfig {
    /// TCP port followers connect to.
    #[arg(default_value_t = defaults::DEFAULT_LEADER_PORT, env = "PLATOON_LEADER_PORT")]
    pub tcp_port: u16,

    /// Address to bind the TCP listener on.
    #[arg(long, default_value = defaults::DEFAULT_LEADER_IP, env = "PLATOON_LEADER_BIND")]
    pub bind_ip: String,

    /// Followers required before the platoon is considered formed.
    #[arg(long, default_value_t = defaults::MIN_FOLLOWERS, env = "PLATOON_MIN_FOLLOWERS")]
    pub min_followers: usize,

    /// Maximum simultaneously registered followers.
    #[arg(long, default_value_t = defaults::MAX_FOLLOWERS, env = "PLATOON_MAX_FOLLOWERS")]
    pub max_followers: usize,

    /// Desired longitudinal gap between consecutive trucks.
    #[arg(long, default_value_t = defaults::TARGET_GAP, env = "PLATOON_TARGET_GAP")]
    pub target_gap: f32,

    /// Length attributed to an intruder vehicle, added to the target gap.
    #[arg(long, default_value_t = defaults::INTRUDER_LENGTH, env = "PLATOON_INTRUDER_LENGTH")]
    pub intruder_length: i32,

    /// Tick-producer / physics cadence, in milliseconds.
    #[arg(long, default_value_t = defaults::LEADER_TICK_DT.as_millis() as u64, env = "PLATOON_TICK_DT_MS")]
    pub tick_dt_ms: u64,

    /// Outbound command ring capacity.
    #[arg(long, default_value_t = defaults::CMD_QUEUE_SIZE, env = "PLATOON_CMD_QUEUE_SIZE")]
    pub cmd_queue_size: usize,

    /// Status line decimation: trace a physics tick every Nth cycle.
    #[arg(long, default_value_t = defaults::LEADER_PRINT_EVERY_N, env = "PLATOON_PRINT_EVERY_N")]
    pub print_every_n: u64,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "PLATOON_LOG_FORMAT")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "PLATOON_LOG_LEVEL")]
    pub log_level: String,
}

impl LeaderConfig {
    /// Reject combinations that would leave the process unable to ever form
    /// a platoon.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.tcp_port != 0, "tcp port must be nonzero");
        anyhow::ensure!(self.min_followers >= 1, "min_followers must be at least 1");
        anyhow::ensure!(
            self.min_followers <= self.max_followers,
            "min_followers ({}) cannot exceed max_followers ({})",
            self.min_followers,
            self.max_followers
        );
        anyhow::ensure!(self.target_gap > 0.0, "target_gap must be positive");
        Ok(())
    }
}
