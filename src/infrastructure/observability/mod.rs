//! Observability for the workbench.
//!
//! `Metrics` holds the Prometheus registry scraped by the `/metrics` HTTP endpoint.
//! `MetricsReporter` additionally pushes a periodic JSON snapshot to stdout, for
//! deployments without a Prometheus scraper in front of the process.

pub mod metrics;
pub mod reporter;

pub use metrics::Metrics;
pub use reporter::MetricsReporter;
