use kube::ResourceExt;
use prometheus::{histogram_opts, opts, HistogramVec, IntCounter, IntCounterVec, Registry};
use tokio::time::Instant;

use crate::api::cluster::Cluster;
use crate::Error;

/// Reconcile metrics of the cluster status controller
#[derive(Clone)]
pub struct Metrics {
    pub reconciliations: IntCounter,
    pub failures: IntCounterVec,
    pub reconcile_duration: HistogramVec,
}

impl Default for Metrics {
    fn default() -> Self {
        let reconcile_duration = HistogramVec::new(
            histogram_opts!(
                "cluster_status_controller_reconcile_duration_seconds",
                "The duration of reconcile to complete in seconds"
            )
            // the health probe alone may hold a reconcile for two seconds
            .buckets(vec![0.01, 0.1, 0.25, 0.5, 1., 2., 2.5, 5., 15., 60.]),
            &[],
        )
        .expect("valid histogram options");
        let failures = IntCounterVec::new(
            opts!(
                "cluster_status_controller_reconciliation_errors_total",
                "reconciliation errors",
            ),
            &["cluster", "error"],
        )
        .expect("valid counter options");
        let reconciliations = IntCounter::new(
            "cluster_status_controller_reconciliations_total",
            "reconciliations",
        )
        .expect("valid counter options");

        Metrics {
            reconciliations,
            failures,
            reconcile_duration,
        }
    }
}

impl Metrics {
    /// Register API metrics to start tracking them.
    pub fn register(self, registry: &Registry) -> Result<Self, prometheus::Error> {
        registry.register(Box::new(self.reconcile_duration.clone()))?;
        registry.register(Box::new(self.failures.clone()))?;
        registry.register(Box::new(self.reconciliations.clone()))?;
        Ok(self)
    }

    pub fn reconcile_failure(&self, cluster: &Cluster, e: &Error) {
        self.failures
            .with_label_values(&[cluster.name_any().as_ref(), e.metric_label().as_ref()])
            .inc()
    }

    pub fn count_and_measure(&self) -> ReconcileMeasurer {
        self.reconciliations.inc();
        ReconcileMeasurer {
            start: Instant::now(),
            metric: self.reconcile_duration.clone(),
        }
    }
}

/// Smart function duration measurer
///
/// Relies on Drop to calculate duration and register the observation in the histogram
pub struct ReconcileMeasurer {
    start: Instant,
    metric: HistogramVec,
}

impl Drop for ReconcileMeasurer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.metric.with_label_values(&[]).observe(duration);
    }
}
