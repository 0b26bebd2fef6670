use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Cluster status controller - keeps member cluster health and capacity in sync
#[derive(Parser, Debug, Clone)]
#[command(name = "cluster-status-controller", version, about, long_about = None)]
pub struct ControllerConfig {
    /// Print the Cluster CRD manifest and exit
    #[arg(long)]
    pub crd: bool,

    /// Seconds between two status computations of a member cluster
    #[arg(
        long,
        env = "CLUSTER_STATUS_UPDATE_FREQUENCY",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub cluster_status_update_frequency: u64,

    /// Seconds to wait before retrying a cluster that asked to be requeued or failed to sync
    #[arg(long, env = "REQUEUE_DELAY", default_value_t = 1)]
    pub requeue_delay: u64,

    /// Address of the metrics and diagnostics server
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:8443")]
    pub bind_address: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl ControllerConfig {
    pub fn status_update_frequency(&self) -> Duration {
        Duration::from_secs(self.cluster_status_update_frequency)
    }

    pub fn requeue_delay(&self) -> Duration {
        Duration::from_secs(self.requeue_delay)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            crd: false,
            cluster_status_update_frequency: 10,
            requeue_delay: 1,
            bind_address: "0.0.0.0:8443".to_string(),
            log_format: LogFormat::Compact,
        }
    }
}
