// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ONION-GATE-NODE - METRICS MODULE
//
// Prometheus-compatible onion-health metrics, exposed via /metrics.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

pub struct OnionMetrics {
    registry: Registry,

    pub onion_reachable: IntGauge,
    pub onion_consecutive_failures: IntGauge,
    pub bootstrap_progress: IntGauge,
    pub add_onion_batches_total: IntCounter,
    pub requests_total: IntCounterVec,
}

impl OnionMetrics {
    pub fn new() -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        let onion_reachable = IntGauge::with_opts(Opts::new(
            "onion_reachable",
            "1 if the primary onion address is currently bound, 0 otherwise",
        ))?;
        registry.register(Box::new(onion_reachable.clone()))?;

        let onion_consecutive_failures = IntGauge::with_opts(Opts::new(
            "onion_consecutive_failures",
            "Consecutive control-protocol or bootstrap failures",
        ))?;
        registry.register(Box::new(onion_consecutive_failures.clone()))?;

        let bootstrap_progress = IntGauge::with_opts(Opts::new(
            "bootstrap_progress",
            "Daemon bootstrap percent, 0-100",
        ))?;
        registry.register(Box::new(bootstrap_progress.clone()))?;

        let add_onion_batches_total = IntCounter::with_opts(Opts::new(
            "add_onion_batches_total",
            "Number of initial ADD_ONION batches issued",
        ))?;
        registry.register(Box::new(add_onion_batches_total.clone()))?;

        let requests_total = IntCounterVec::new(
            Opts::new("requests_total", "Inbound requests per onion"),
            &["onion"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            onion_reachable,
            onion_consecutive_failures,
            bootstrap_progress,
            add_onion_batches_total,
            requests_total,
        }))
    }

    pub fn export(&self) -> Result<String, Box<dyn std::error::Error>> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
