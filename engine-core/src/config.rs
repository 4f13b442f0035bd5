//! Process configuration, parsed from CLI arguments (spec §4.0's ambient
//! configuration surface).

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Runtime configuration for the engine process.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// Port the inbound order gateway listens on.
    #[arg(short, long, default_value = "7000")]
    pub port: u16,

    /// Directory holding the durable log.
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Worker threads in each of the event-processor and
    /// transaction-processor pools (spec §4.12).
    #[arg(long, default_value = "4")]
    pub workers: usize,

    /// Address the Prometheus `/metrics` endpoint binds to.
    #[arg(long, default_value = "127.0.0.1:9090")]
    pub metrics_addr: SocketAddr,

    /// Log level (trace/debug/info/warn/error).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit structured JSON logs instead of human-readable ones.
    #[arg(long)]
    pub json_logs: bool,
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be at least 1".to_string());
        }
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(format!("invalid log level '{}', must be one of {valid_log_levels:?}", self.log_level));
        }
        Ok(())
    }
}
