//! rstest fixtures for integration tests
//!
//! # Usage
//!
//! ```rust
//! use crate::support::fixtures::*;
//!
//! #[rstest]
//! fn my_test(keyword_reranker: Reranker, catalog: ResultSet) {
//!     // both are constructed fresh for every test
//! }
//! ```

use super::helpers::{result_set, FileNameRegionsLoader, KeywordLoader};
use rstest::*;
use search_rerank::config::{Config, ScoringBackend, DEFAULT_MODEL};
use search_rerank::path::Utf8PathBuf;
use search_rerank::rerank::{Reranker, StrategyRegistry};
use search_rerank::results::ResultSet;
use search_rerank::scoring::Device;
use serde_json::json;
use std::sync::Arc;

/// Reranker with the keyword text backend and file-name region backend.
#[fixture]
pub fn keyword_reranker() -> Reranker {
    Reranker::new(StrategyRegistry::builtin(
        Arc::new(KeywordLoader::default()),
        Some(Arc::new(FileNameRegionsLoader)),
    ))
}

/// A small product catalog as returned by a first-pass search.
#[fixture]
pub fn catalog() -> ResultSet {
    result_set(json!({
        "hits": [
            {"id": 1, "title": "Green wool hat", "desc": "Warm winter hat", "original_score": 0.9},
            {"id": 2, "title": "Blue canvas shoes", "desc": "Light summer shoes", "original_score": 0.8},
            {"id": 3, "title": "Red running shoes", "desc": "Red shoes for trail running", "original_score": 0.7},
            {"id": 4, "price": 12, "original_score": 0.6}
        ],
        "query_time_ms": 4
    }))
}

/// Config using the model-free lexical backend.
#[fixture]
pub fn lexical_config() -> Config {
    Config {
        model_name: DEFAULT_MODEL.to_string(),
        device: Device::Cpu,
        backend: ScoringBackend::Lexical,
        model_dir: Utf8PathBuf::from("/nonexistent/models"),
        searchable_fields: Some(vec!["title".to_string(), "desc".to_string()]),
        num_highlights: 1,
        overwrite: true,
        sort_results: true,
        cache_size: 16,
        max_passage_chars: 2000,
    }
}
