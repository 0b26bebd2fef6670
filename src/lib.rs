use controllers::StatusSyncError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kube Error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Status sync error: {0}")]
    StatusSync(#[from] StatusSyncError),

    #[error("Metrics registration error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn metric_label(&self) -> String {
        match self {
            Error::KubeError(_) => "kube".to_string(),
            Error::StatusSync(e) => format!("{e:?}")
                .split('(')
                .next()
                .unwrap_or_default()
                .to_lowercase(),
            Error::Metrics(_) => "metrics".to_string(),
        }
    }
}

/// Expose all controller components used by main
pub mod controller;
pub use crate::controller::*;
pub mod api;
pub mod config;
pub mod controllers;
pub mod predicates;
pub mod quantity;

/// Log and trace integrations
pub mod telemetry;

/// Metrics
mod metrics;
pub use metrics::Metrics;
