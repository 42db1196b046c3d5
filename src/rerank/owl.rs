//! Image/region ("owl") strategy.
//!
//! The selected fields hold image locations. Every image of a hit is scored
//! region by region; the best region over all of the hit's images becomes the
//! hit score and its bounding box the single highlight.

use super::dispatch::{RerankStrategy, StrategyFamily, StrategySpec};
use crate::error::RerankerError;
use crate::results::ResultSet;
use crate::scoring::{ImageSize, RegionScore, RegionScorer, RegionScorerLoader};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Images are normalized to this size before region scoring.
pub const OWL_IMAGE_SIZE: ImageSize = ImageSize {
    width: 240,
    height: 240,
};

pub struct OwlFamily {
    loader: Option<Arc<dyn RegionScorerLoader>>,
}

impl OwlFamily {
    pub fn new(loader: Option<Arc<dyn RegionScorerLoader>>) -> Self {
        Self { loader }
    }
}

/// The non-blank field names, or a configuration error when none are left.
pub fn image_fields(model_name: &str, fields: Option<&[String]>) -> Result<Vec<String>> {
    let names: Vec<String> = fields
        .unwrap_or_default()
        .iter()
        .filter(|name| !name.trim().is_empty())
        .cloned()
        .collect();

    if names.is_empty() {
        return Err(RerankerError::invalid_configuration(
            model_name,
            format!(
                "image-based reranking needs a non-empty list of image fields, found {:?}",
                fields
            ),
        )
        .into());
    }
    Ok(names)
}

impl StrategyFamily for OwlFamily {
    fn tag(&self) -> &'static str {
        "owl"
    }

    fn claims(&self, model_name: &str) -> bool {
        model_name.to_lowercase().contains("owl")
    }

    fn build(&self, spec: &StrategySpec<'_>) -> Result<Box<dyn RerankStrategy>> {
        image_fields(spec.model_name, spec.searchable_fields)?;

        let loader = self
            .loader
            .as_ref()
            .ok_or_else(|| RerankerError::BackendUnavailable {
                family: self.tag().to_string(),
                model_name: spec.model_name.to_string(),
            })?;

        let scorer = loader
            .load(spec.model_name, spec.device)
            .with_context(|| format!("Failed to load region scorer '{}'", spec.model_name))?;

        Ok(Box::new(OwlStrategy::new(
            spec.model_name,
            scorer,
            OWL_IMAGE_SIZE,
        )))
    }
}

pub struct OwlStrategy {
    model_name: String,
    scorer: Arc<dyn RegionScorer>,
    image_size: ImageSize,
}

impl OwlStrategy {
    pub fn new(model_name: &str, scorer: Arc<dyn RegionScorer>, image_size: ImageSize) -> Self {
        Self {
            model_name: model_name.to_string(),
            scorer,
            image_size,
        }
    }

    fn best_region(&self, query: &str, field: &str, location: &str) -> Result<Option<RegionScore>> {
        let regions = self
            .scorer
            .score_regions(query, location, self.image_size)
            .with_context(|| format!("Region scoring failed for {field}={location}"))?;
        Ok(regions
            .into_iter()
            .filter(|r| r.score.is_finite())
            .reduce(|best, r| if r.score > best.score { r } else { best }))
    }
}

impl RerankStrategy for OwlStrategy {
    fn name(&self) -> &str {
        "owl"
    }

    fn rerank(
        &self,
        query: &str,
        results: &mut ResultSet,
        fields: Option<&[String]>,
    ) -> Result<usize> {
        let fields = image_fields(&self.model_name, fields)?;

        let mut winners: Vec<(usize, String, RegionScore)> = Vec::new();
        for (index, hit) in results.hits().iter().enumerate() {
            let mut best: Option<(String, RegionScore)> = None;
            for field in &fields {
                let Some(location) = hit.text_field(field) else {
                    continue;
                };
                if let Some(region) = self.best_region(query, field, location)? {
                    let better = best
                        .as_ref()
                        .map_or(true, |(_, current)| region.score > current.score);
                    if better {
                        best = Some((field.clone(), region));
                    }
                }
            }
            if let Some((field, region)) = best {
                winners.push((index, field, region));
            }
        }

        let rescored = winners.len();
        for (index, field, region) in winners {
            if let Some(scratch) = results.scratch_mut(index) {
                let mut span = Map::new();
                span.insert(
                    field,
                    Value::Array(region.bbox.iter().map(|&c| Value::from(c)).collect()),
                );
                scratch.record(
                    index,
                    f64::from(region.score),
                    Some(vec![Value::Object(span)]),
                );
            }
        }

        tracing::debug!(rescored, model = %self.model_name, "Owl rerank complete");
        Ok(rescored)
    }
}
