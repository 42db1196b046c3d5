use crate::rerank::RerankOutcome;
use prometheus::{Counter, Encoder, Histogram, Registry, TextEncoder};
use std::time::Duration;

pub struct RerankMetrics {
    pub registry: Registry,

    pub requests_total: Counter,
    pub skipped_total: Counter,
    pub errors_total: Counter,
    pub hits_rescored_total: Counter,
    pub rerank_duration: Histogram,
}

impl RerankMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total =
            Counter::new("rerank_requests_total", "Total number of rerank requests")?;

        let skipped_total = Counter::new(
            "rerank_skipped_total",
            "Rerank requests skipped because no hit carried a searchable field",
        )?;

        let errors_total = Counter::new("rerank_errors_total", "Rerank requests that failed")?;

        let hits_rescored_total = Counter::new(
            "rerank_hits_rescored_total",
            "Total number of hits given a reranker score",
        )?;

        // Rerank duration histogram (1ms to 30 seconds)
        let rerank_duration = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "rerank_duration_seconds",
                "Rerank call duration in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ]),
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(skipped_total.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;
        registry.register(Box::new(hits_rescored_total.clone()))?;
        registry.register(Box::new(rerank_duration.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            skipped_total,
            errors_total,
            hits_rescored_total,
            rerank_duration,
        })
    }

    pub fn observe(&self, outcome: &anyhow::Result<RerankOutcome>, elapsed: Duration) {
        self.requests_total.inc();
        self.rerank_duration.observe(elapsed.as_secs_f64());
        match outcome {
            Ok(RerankOutcome::Skipped) => self.skipped_total.inc(),
            Ok(RerankOutcome::Reranked { rescored, .. }) => {
                self.hits_rescored_total.inc_by(*rescored as f64)
            }
            Err(_) => self.errors_total.inc(),
        }
    }

    /// Prometheus text exposition of every registered metric.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
