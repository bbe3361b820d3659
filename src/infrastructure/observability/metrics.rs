//! Prometheus metrics definitions for the workbench.
//!
//! All metrics use the `workbench_` prefix and are read-only from the HTTP surface's
//! point of view; the service layer updates them as a side effect of normal work.

use prometheus::{
    CounterVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    pub tasks_total: CounterVec,
    pub tasks_in_flight: GenericGauge<AtomicF64>,
    pub orphaned_tasks: GenericGauge<AtomicF64>,
    pub risk_checks_total: CounterVec,
    pub sim_confirms_total: CounterVec,
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let tasks_total = CounterVec::new(
            Opts::new("workbench_tasks_total", "Total tasks by type and terminal status"),
            &["task_type", "status"],
        )?;
        registry.register(Box::new(tasks_total.clone()))?;

        let tasks_in_flight = GenericGauge::<AtomicF64>::new(
            "workbench_tasks_in_flight",
            "Number of tasks currently RUNNING",
        )?;
        registry.register(Box::new(tasks_in_flight.clone()))?;

        let orphaned_tasks = GenericGauge::<AtomicF64>::new(
            "workbench_orphaned_tasks",
            "RUNNING task rows found at boot with no live worker",
        )?;
        registry.register(Box::new(orphaned_tasks.clone()))?;

        let risk_checks_total = CounterVec::new(
            Opts::new("workbench_risk_checks_total", "Risk checks by verdict"),
            &["status"],
        )?;
        registry.register(Box::new(risk_checks_total.clone()))?;

        let sim_confirms_total = CounterVec::new(
            Opts::new("workbench_sim_confirms_total", "Sim confirmations by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(sim_confirms_total.clone()))?;

        let http_requests_total = CounterVec::new(
            Opts::new("workbench_http_requests_total", "HTTP requests by route and status"),
            &["route", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "workbench_http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["route"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            tasks_total,
            tasks_in_flight,
            orphaned_tasks,
            risk_checks_total,
            sim_confirms_total,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families).unwrap_or_default()
    }

    pub fn inc_task(&self, task_type: &str, status: &str) {
        self.tasks_total.with_label_values(&[task_type, status]).inc();
    }

    pub fn inc_risk_check(&self, status: &str) {
        self.risk_checks_total.with_label_values(&[status]).inc();
    }

    pub fn inc_sim_confirm(&self, outcome: &str) {
        self.sim_confirms_total.with_label_values(&[outcome]).inc();
    }

    pub fn observe_http(&self, route: &str, status: u16, latency_secs: f64) {
        self.http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[route])
            .observe(latency_secs);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to create default Metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_prefixed_metrics() {
        let metrics = Metrics::new().expect("metrics construct");
        assert!(metrics.render().contains("workbench_"));
    }

    #[test]
    fn counts_tasks_by_type_and_status() {
        let metrics = Metrics::new().expect("metrics construct");
        metrics.inc_task("ingest_bars_daily", "SUCCEEDED");
        metrics.inc_task("ingest_bars_daily", "FAILED");
        let output = metrics.render();
        assert!(output.contains("workbench_tasks_total"));
        assert!(output.contains("ingest_bars_daily"));
    }
}
