//! Test helper functions for integration tests
//!
//! Deterministic model backends and JSON conversion helpers. These are not
//! rstest fixtures; call them directly.

use anyhow::Result;
use search_rerank::results::ResultSet;
use search_rerank::scoring::{
    CrossEncoder, CrossEncoderLoader, Device, ImageSize, RegionScore, RegionScorer,
    RegionScorerLoader,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Parse a JSON literal into a result set.
pub fn result_set(value: Value) -> ResultSet {
    serde_json::from_value(value).expect("valid result set")
}

pub fn to_json(results: &ResultSet) -> Value {
    serde_json::to_value(results).expect("serializable result set")
}

pub fn score_at(out: &Value, index: usize) -> f64 {
    out["hits"][index]["original_score"]
        .as_f64()
        .expect("numeric original_score")
}

/// Fraction of query words found in the passage. Case-insensitive.
pub struct KeywordEncoder;

impl CrossEncoder for KeywordEncoder {
    fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        Ok(passages
            .iter()
            .map(|passage| {
                if words.is_empty() {
                    return 0.0;
                }
                let passage = passage.to_lowercase();
                let found = words.iter().filter(|w| passage.contains(w.as_str())).count();
                found as f32 / words.len() as f32
            })
            .collect())
    }
}

/// Hands out [`KeywordEncoder`] and counts how often it was asked to.
#[derive(Default)]
pub struct KeywordLoader {
    pub loads: AtomicUsize,
}

impl KeywordLoader {
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl CrossEncoderLoader for KeywordLoader {
    fn load(&self, _model_name: &str, _device: Device) -> Result<Arc<dyn CrossEncoder>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(KeywordEncoder))
    }
}

/// Region scorer keyed on the image file name.
///
/// `*cat*` images get a strong box, `*dog*` images a weak one, everything
/// else no regions at all.
pub struct FileNameRegions;

impl RegionScorer for FileNameRegions {
    fn score_regions(
        &self,
        _query: &str,
        image_location: &str,
        size: ImageSize,
    ) -> Result<Vec<RegionScore>> {
        assert_eq!((size.width, size.height), (240, 240));
        if image_location.contains("cat") {
            Ok(vec![
                RegionScore {
                    bbox: [10.0, 20.0, 110.0, 220.0],
                    score: 0.75,
                },
                RegionScore {
                    bbox: [0.0, 0.0, 5.0, 5.0],
                    score: 0.125,
                },
            ])
        } else if image_location.contains("dog") {
            Ok(vec![RegionScore {
                bbox: [1.0, 1.0, 2.0, 2.0],
                score: 0.25,
            }])
        } else {
            Ok(vec![])
        }
    }
}

pub struct FileNameRegionsLoader;

impl RegionScorerLoader for FileNameRegionsLoader {
    fn load(&self, _model_name: &str, _device: Device) -> Result<Arc<dyn RegionScorer>> {
        Ok(Arc::new(FileNameRegions))
    }
}
