//! Text cross-encoder strategy.
//!
//! Each text-bearing field selected for a hit becomes one candidate passage.
//! All passages of all hits go to the cross-encoder in a single batch. The
//! hit score is the best field score, except in unrestricted mode where the
//! concatenation of every text field is scored as the document. Highlights
//! are the best-scoring fields, as `{field: text}` objects.

use super::dispatch::{RerankStrategy, StrategyFamily, StrategySpec};
use crate::error::RerankerError;
use crate::results::ResultSet;
use crate::scoring::{CrossEncoder, CrossEncoderLoader};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::sync::Arc;

pub struct TextFamily {
    loader: Arc<dyn CrossEncoderLoader>,
}

impl TextFamily {
    pub fn new(loader: Arc<dyn CrossEncoderLoader>) -> Self {
        Self { loader }
    }
}

impl StrategyFamily for TextFamily {
    fn tag(&self) -> &'static str {
        "text"
    }

    fn claims(&self, _model_name: &str) -> bool {
        true
    }

    fn build(&self, spec: &StrategySpec<'_>) -> Result<Box<dyn RerankStrategy>> {
        let encoder = self
            .loader
            .load(spec.model_name, spec.device)
            .with_context(|| format!("Failed to load text reranker '{}'", spec.model_name))?;
        Ok(Box::new(TextStrategy::new(encoder, spec.num_highlights)))
    }
}

pub struct TextStrategy {
    encoder: Arc<dyn CrossEncoder>,
    num_highlights: usize,
}

struct HitPlan {
    index: usize,
    fields: Vec<(String, String)>,
    start: usize,
    document: Option<usize>,
}

impl TextStrategy {
    pub fn new(encoder: Arc<dyn CrossEncoder>, num_highlights: usize) -> Self {
        Self {
            encoder,
            num_highlights,
        }
    }

    fn plan(results: &ResultSet, fields: Option<&[String]>) -> (Vec<HitPlan>, Vec<String>) {
        let mut plans = Vec::new();
        let mut passages = Vec::new();

        for (index, hit) in results.hits().iter().enumerate() {
            let candidates: Vec<(String, String)> = match fields {
                Some(names) => names
                    .iter()
                    .filter_map(|name| {
                        hit.text_field(name)
                            .map(|text| (name.clone(), text.to_string()))
                    })
                    .collect(),
                None => hit
                    .text_fields()
                    .map(|(name, text)| (name.to_string(), text.to_string()))
                    .collect(),
            };
            if candidates.is_empty() {
                continue;
            }

            let start = passages.len();
            passages.extend(candidates.iter().map(|(_, text)| text.clone()));

            let document = if fields.is_none() && candidates.len() > 1 {
                let joined = candidates
                    .iter()
                    .map(|(_, text)| text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                passages.push(joined);
                Some(passages.len() - 1)
            } else {
                None
            };

            plans.push(HitPlan {
                index,
                fields: candidates,
                start,
                document,
            });
        }

        (plans, passages)
    }

    fn highlights(&self, fields: Vec<(String, String)>, scores: &[f32]) -> Vec<Value> {
        let mut ranked: Vec<((String, String), f32)> = fields
            .into_iter()
            .zip(scores.iter().copied())
            .filter(|(_, score)| score.is_finite())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
            .into_iter()
            .take(self.num_highlights)
            .map(|((name, text), _)| {
                let mut span = Map::new();
                span.insert(name, Value::String(text));
                Value::Object(span)
            })
            .collect()
    }
}

impl RerankStrategy for TextStrategy {
    fn name(&self) -> &str {
        "text"
    }

    fn rerank(
        &self,
        query: &str,
        results: &mut ResultSet,
        fields: Option<&[String]>,
    ) -> Result<usize> {
        let (plans, passages) = Self::plan(results, fields);
        if passages.is_empty() {
            tracing::debug!("No text passages to rerank");
            return Ok(0);
        }

        let scores = self.encoder.score(query, &passages)?;
        if scores.len() != passages.len() {
            return Err(RerankerError::ScoreCountMismatch {
                expected: passages.len(),
                actual: scores.len(),
            }
            .into());
        }

        let mut rescored = 0usize;
        for plan in plans {
            let field_scores = &scores[plan.start..plan.start + plan.fields.len()];
            let best_field = field_scores
                .iter()
                .copied()
                .filter(|s| s.is_finite())
                .reduce(f32::max);
            let hit_score = plan
                .document
                .map(|doc| scores[doc])
                .filter(|s| s.is_finite())
                .or(best_field);

            // A hit the model could not score keeps its first-pass values
            let Some(hit_score) = hit_score else {
                tracing::debug!(hit = plan.index, "No finite score, leaving hit untouched");
                continue;
            };

            let highlights = (self.num_highlights > 0)
                .then(|| self.highlights(plan.fields, field_scores));

            if let Some(scratch) = results.scratch_mut(plan.index) {
                scratch.record(plan.index, f64::from(hit_score), highlights);
                rescored += 1;
            }
        }

        tracing::debug!(
            rescored,
            passages = passages.len(),
            "Text rerank complete"
        );
        Ok(rescored)
    }
}
