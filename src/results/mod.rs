//! Canonical search-results container.
//!
//! A [`ResultSet`] keeps the document payload of each hit ([`Hit`]) apart from
//! the per-hit reranking scratch values ([`RerankScratch`]). The two live in
//! parallel vectors joined by hit index, so a document field that happens to
//! be called `reranker_score` can never be mistaken for pipeline state.
//!
//! At the JSON boundary both halves are flattened into one object per hit,
//! using the reserved keys below.

pub mod finalize;

pub use finalize::finalize;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

pub const HITS: &str = "hits";
pub const ORIGINAL_SCORE: &str = "original_score";
pub const HIGHLIGHTS: &str = "highlights";
pub const RERANKER_SCORE: &str = "reranker_score";
pub const HIGHLIGHTS_RERANKED: &str = "highlights_reranked";
pub const RERANKED_ID: &str = "reranked_id";

/// One retrieved document plus its authoritative ranking metadata.
///
/// `original_score` and `highlights` hold the JSON values exactly as they
/// arrived (a key holding `null` is `Some(Value::Null)`), so a hit the
/// pipeline never touches serializes back unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hit {
    pub fields: Map<String, Value>,
    pub original_score: Option<Value>,
    pub highlights: Option<Value>,
}

impl Hit {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            original_score: None,
            highlights: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.original_score = Some(Value::from(score));
        self
    }

    pub fn with_highlights(mut self, highlights: Vec<Value>) -> Self {
        self.highlights = Some(Value::Array(highlights));
        self
    }

    /// Numeric view of `original_score`, when it is a number.
    pub fn score(&self) -> Option<f64> {
        self.original_score.as_ref().and_then(Value::as_f64)
    }

    /// Key presence check used by the applicability guard.
    pub fn contains_field(&self, name: &str) -> bool {
        match name {
            ORIGINAL_SCORE => self.original_score.is_some(),
            HIGHLIGHTS => self.highlights.is_some(),
            _ => self.fields.contains_key(name),
        }
    }

    /// A document field holding non-blank text.
    pub fn text_field(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Every text-bearing document field, in key order.
    pub fn text_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().filter_map(|(k, v)| match v {
            Value::String(s) if !s.trim().is_empty() => Some((k.as_str(), s.as_str())),
            _ => None,
        })
    }

    fn from_map(mut map: Map<String, Value>) -> Self {
        let original_score = map.remove(ORIGINAL_SCORE);
        let highlights = map.remove(HIGHLIGHTS);
        Self {
            fields: map,
            original_score,
            highlights,
        }
    }

    fn write_into(&self, map: &mut Map<String, Value>) {
        for (k, v) in &self.fields {
            map.insert(k.clone(), v.clone());
        }
        if let Some(score) = &self.original_score {
            map.insert(ORIGINAL_SCORE.to_string(), score.clone());
        }
        if let Some(highlights) = &self.highlights {
            map.insert(HIGHLIGHTS.to_string(), highlights.clone());
        }
    }
}

/// Values a strategy writes while it processes a hit. Promoted or dropped by
/// [`finalize`]. Values read back from JSON are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RerankScratch {
    pub reranker_score: Option<Value>,
    pub highlights_reranked: Option<Value>,
    pub reranked_id: Option<Value>,
}

impl RerankScratch {
    pub fn is_empty(&self) -> bool {
        self.reranker_score.is_none()
            && self.highlights_reranked.is_none()
            && self.reranked_id.is_none()
    }

    /// Numeric view of `reranker_score`, when it is a number.
    pub fn score(&self) -> Option<f64> {
        self.reranker_score.as_ref().and_then(Value::as_f64)
    }

    /// Store a strategy's verdict for the hit at `index`. Highlights are
    /// left as they were when `highlights` is `None`.
    pub fn record(&mut self, index: usize, score: f64, highlights: Option<Vec<Value>>) {
        self.reranker_score = Some(Value::from(score));
        self.reranked_id = Some(Value::String(index.to_string()));
        if let Some(highlights) = highlights {
            self.highlights_reranked = Some(Value::Array(highlights));
        }
    }

    fn take_from(map: &mut Map<String, Value>) -> Self {
        Self {
            reranker_score: map.remove(RERANKER_SCORE),
            highlights_reranked: map.remove(HIGHLIGHTS_RERANKED),
            reranked_id: map.remove(RERANKED_ID),
        }
    }

    fn write_into(&self, map: &mut Map<String, Value>) {
        if let Some(score) = &self.reranker_score {
            map.insert(RERANKER_SCORE.to_string(), score.clone());
        }
        if let Some(highlights) = &self.highlights_reranked {
            map.insert(HIGHLIGHTS_RERANKED.to_string(), highlights.clone());
        }
        if let Some(id) = &self.reranked_id {
            map.insert(RERANKED_ID.to_string(), id.clone());
        }
    }
}

/// The container handed to the reranker. Owned by the caller, borrowed
/// mutably for the length of one pipeline call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawResultSet", into = "RawResultSet")]
pub struct ResultSet {
    hits: Vec<Hit>,
    scratch: Vec<RerankScratch>,
    extra: Map<String, Value>,
}

impl ResultSet {
    pub fn from_hits(hits: Vec<Hit>) -> Self {
        let scratch = vec![RerankScratch::default(); hits.len()];
        Self {
            hits,
            scratch,
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn push(&mut self, hit: Hit) {
        self.hits.push(hit);
        self.scratch.push(RerankScratch::default());
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    /// Mutable access to the hits. A slice, so the hit count (and with it the
    /// index join to the scratch table) cannot change.
    pub fn hits_mut(&mut self) -> &mut [Hit] {
        &mut self.hits
    }

    pub fn hit(&self, index: usize) -> Option<&Hit> {
        self.hits.get(index)
    }

    pub fn scratch(&self, index: usize) -> Option<&RerankScratch> {
        self.scratch.get(index)
    }

    pub fn scratch_mut(&mut self, index: usize) -> Option<&mut RerankScratch> {
        self.scratch.get_mut(index)
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn iter_with_scratch(&self) -> impl Iterator<Item = (&Hit, &RerankScratch)> {
        self.hits.iter().zip(self.scratch.iter())
    }

    pub fn iter_mut_with_scratch(
        &mut self,
    ) -> impl Iterator<Item = (&mut Hit, &mut RerankScratch)> {
        self.hits.iter_mut().zip(self.scratch.iter_mut())
    }

    /// True while any hit still carries a scratch value.
    pub fn has_scratch(&self) -> bool {
        self.scratch.iter().any(|s| !s.is_empty())
    }

    /// Stable re-sort by `original_score`, highest first. Hits without a
    /// numeric score go last. Scratch values travel with their hit.
    pub fn sort_by_score(&mut self) {
        let mut paired: Vec<(Hit, RerankScratch)> = self
            .hits
            .drain(..)
            .zip(self.scratch.drain(..))
            .collect();

        paired.sort_by(|(a, _), (b, _)| match (a.score(), b.score()) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        (self.hits, self.scratch) = paired.into_iter().unzip();
    }
}

/// Wire shape of a [`ResultSet`]. `hits` is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawResultSet {
    hits: Vec<Map<String, Value>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<RawResultSet> for ResultSet {
    fn from(raw: RawResultSet) -> Self {
        let mut hits = Vec::with_capacity(raw.hits.len());
        let mut scratch = Vec::with_capacity(raw.hits.len());
        for mut map in raw.hits {
            scratch.push(RerankScratch::take_from(&mut map));
            hits.push(Hit::from_map(map));
        }
        Self {
            hits,
            scratch,
            extra: raw.extra,
        }
    }
}

impl From<ResultSet> for RawResultSet {
    fn from(set: ResultSet) -> Self {
        let hits = set
            .iter_with_scratch()
            .map(|(hit, scratch)| {
                let mut map = Map::new();
                hit.write_into(&mut map);
                scratch.write_into(&mut map);
                map
            })
            .collect();
        Self {
            hits,
            extra: set.extra,
        }
    }
}
