//! Reranking orchestration: guard, dispatch, strategy execution, finalize.

pub mod dispatch;
pub mod guard;
pub mod owl;
pub mod text;

pub use dispatch::{
    dispatch, RerankStrategy, StrategyFamily, StrategyHandle, StrategyRegistry, StrategySpec,
};
pub use guard::is_applicable;

use crate::config::Config;
use crate::metrics::RerankMetrics;
use crate::results::{finalize, ResultSet};
use crate::scoring::{create_cross_encoder_loader, Device, RegionScorerLoader};
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;

/// One reranking call.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankRequest {
    pub query: String,
    pub model_name: String,
    pub device: Device,
    /// `None` means every field of a hit is eligible.
    pub searchable_fields: Option<Vec<String>>,
    pub num_highlights: usize,
    /// Promote reranked values into the authoritative fields afterwards.
    pub overwrite: bool,
}

impl RerankRequest {
    pub fn new(query: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            model_name: model_name.into(),
            device: Device::Cpu,
            searchable_fields: None,
            num_highlights: 1,
            overwrite: true,
        }
    }

    pub fn from_config(query: impl Into<String>, config: &Config) -> Self {
        Self {
            query: query.into(),
            model_name: config.model_name.clone(),
            device: config.device,
            searchable_fields: config.searchable_fields.clone(),
            num_highlights: config.num_highlights,
            overwrite: config.overwrite,
        }
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn with_searchable_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_num_highlights(mut self, num_highlights: usize) -> Self {
        self.num_highlights = num_highlights;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerankOutcome {
    /// No hit carries any of the requested fields; nothing was changed.
    Skipped,
    Reranked { rescored: usize, finalized: bool },
}

/// Entry point of the pipeline. Holds the strategy registry and, optionally,
/// a metrics sink. Never holds on to a result set between calls.
pub struct Reranker {
    registry: StrategyRegistry,
    metrics: Option<Arc<RerankMetrics>>,
}

impl Reranker {
    pub fn new(registry: StrategyRegistry) -> Self {
        Self {
            registry,
            metrics: None,
        }
    }

    /// Built-in families with the text backend chosen by `config`.
    pub fn from_config(
        config: &Config,
        region_loader: Option<Arc<dyn RegionScorerLoader>>,
    ) -> Self {
        Self::new(StrategyRegistry::builtin(
            create_cross_encoder_loader(config),
            region_loader,
        ))
    }

    pub fn with_metrics(mut self, metrics: Arc<RerankMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Rerank `results` in place.
    ///
    /// Skips silently when the guard rejects the set. Configuration errors
    /// are raised before any hit is touched; strategy errors propagate as-is
    /// and may leave scratch values behind, in which case nothing is
    /// finalized.
    pub fn rerank(&self, results: &mut ResultSet, request: &RerankRequest) -> Result<RerankOutcome> {
        let started = Instant::now();
        let outcome = self.run(results, request);

        if let Some(metrics) = &self.metrics {
            metrics.observe(&outcome, started.elapsed());
        }
        if let Err(err) = &outcome {
            tracing::warn!(model = %request.model_name, error = %err, "Rerank failed");
        }
        outcome
    }

    fn run(&self, results: &mut ResultSet, request: &RerankRequest) -> Result<RerankOutcome> {
        let fields = request.searchable_fields.as_deref();

        if !is_applicable(results, fields) {
            tracing::info!(
                fields = ?fields,
                hits = results.len(),
                "No hit carries a searchable field, skipping rerank"
            );
            return Ok(RerankOutcome::Skipped);
        }

        let spec = StrategySpec {
            model_name: &request.model_name,
            device: request.device,
            searchable_fields: fields,
            num_highlights: request.num_highlights,
        };
        let handle = dispatch(&self.registry, results, &request.query, &spec)?;
        let rescored = handle.execute(results)?;

        if request.overwrite {
            finalize(results);
        }

        tracing::info!(
            family = handle.family(),
            model = %request.model_name,
            rescored,
            hits = results.len(),
            finalized = request.overwrite,
            "Reranked results"
        );

        Ok(RerankOutcome::Reranked {
            rescored,
            finalized: request.overwrite,
        })
    }
}
