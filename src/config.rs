//! Command-line and environment configuration.
//!
//! Everything is read once at startup; there is no reload.

use crate::delivery::DeliveryConfig;
use crate::worker::WorkerConfig;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Webhook relay: accept callbacks into a queue and fan them out to subscribers.
#[derive(Parser, Debug)]
#[command(name = "webhook-relay")]
#[command(about = "Accept webhook callbacks into SQS and fan them out to subscribers")]
pub struct RelayArgs {
    /// Name of the SQS queue callbacks are published to.
    #[arg(long, env = "RELAY_QUEUE_NAME", default_value = "new_request_dev", global = true)]
    pub queue_name: String,

    /// AWS region of the queue.
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1", global = true)]
    pub region: String,

    /// AWS credential profile. Uses the default chain when unset.
    #[arg(long, env = "AWS_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the ingestion HTTP server.
    Serve(ServeArgs),
    /// Consume the queue and deliver to subscribers.
    Worker(WorkerArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "RELAY_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "RELAY_PORT", default_value = "3000")]
    pub port: u16,
}

impl ServeArgs {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[derive(Args, Debug, Clone)]
pub struct WorkerArgs {
    /// JSON file mapping tokens to their subscribers.
    #[arg(long, env = "RELAY_SUBSCRIBERS_FILE")]
    pub subscribers: PathBuf,

    /// Timeout for each outbound delivery, in seconds.
    #[arg(long, env = "RELAY_DELIVERY_TIMEOUT_SECS", default_value = "5")]
    pub delivery_timeout_secs: u64,

    /// Maximum concurrent deliveries per message.
    #[arg(long, env = "RELAY_MAX_IN_FLIGHT", default_value = "16",
          value_parser = clap::value_parser!(u16).range(1..))]
    pub max_in_flight: u16,

    /// Messages per receive call.
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(i32).range(1..=10))]
    pub batch_size: i32,

    /// Long-poll wait per receive call, in seconds.
    #[arg(long, default_value = "20", value_parser = clap::value_parser!(i32).range(0..=20))]
    pub wait_secs: i32,

    /// Idle connections kept per subscriber host.
    #[arg(long, default_value = "10")]
    pub pool_max_idle_per_host: usize,

    /// Seconds before an idle connection is closed.
    #[arg(long, default_value = "90")]
    pub pool_idle_timeout_secs: u64,
}

impl WorkerArgs {
    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            timeout: Duration::from_secs(self.delivery_timeout_secs),
            max_in_flight: usize::from(self.max_in_flight),
            pool_max_idle_per_host: self.pool_max_idle_per_host,
            pool_idle_timeout: Duration::from_secs(self.pool_idle_timeout_secs),
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            batch_size: self.batch_size,
            wait_secs: self.wait_secs,
            ..WorkerConfig::default()
        }
    }
}
