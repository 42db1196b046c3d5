//! Model backends consumed by the rerank strategies.
//!
//! Strategies never talk to a model directly. They go through the two narrow
//! traits here, obtained from loaders keyed by model name and [`Device`].

pub mod cache;
pub mod lexical;
pub mod onnx;

use crate::config::{Config, ScoringBackend};
use crate::path::Utf8PathBuf;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Compute placement requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda(u32),
    Metal,
}

impl Default for Device {
    fn default() -> Self {
        Device::Cpu
    }
}

impl FromStr for Device {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim().to_lowercase();
        match value.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda(0)),
            "metal" => Ok(Device::Metal),
            other => match other.strip_prefix("cuda:") {
                Some(ordinal) => ordinal
                    .parse::<u32>()
                    .map(Device::Cuda)
                    .map_err(|err| anyhow!("Invalid cuda ordinal '{ordinal}': {err}")),
                None => Err(anyhow!("Invalid device: {other}")),
            },
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
            Device::Metal => write!(f, "metal"),
        }
    }
}

/// Target size images are normalized to before region scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// One scored region of an image, in pixel coordinates of the normalized
/// image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionScore {
    pub bbox: [f32; 4],
    pub score: f32,
}

/// Scores (query, passage) pairs. One score per passage, higher is better.
pub trait CrossEncoder: Send + Sync {
    fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>>;
}

/// Scores regions of an image against a text query.
pub trait RegionScorer: Send + Sync {
    fn score_regions(
        &self,
        query: &str,
        image_location: &str,
        size: ImageSize,
    ) -> Result<Vec<RegionScore>>;
}

pub trait CrossEncoderLoader: Send + Sync {
    fn load(&self, model_name: &str, device: Device) -> Result<Arc<dyn CrossEncoder>>;
}

pub trait RegionScorerLoader: Send + Sync {
    fn load(&self, model_name: &str, device: Device) -> Result<Arc<dyn RegionScorer>>;
}

/// Loads ONNX cross-encoders from `<model_dir>/<model_name>/model.onnx`.
pub struct OnnxLoader {
    model_dir: Utf8PathBuf,
    max_passage_chars: usize,
    cache_size: usize,
}

impl OnnxLoader {
    pub fn new(model_dir: Utf8PathBuf, max_passage_chars: usize, cache_size: usize) -> Self {
        Self {
            model_dir,
            max_passage_chars,
            cache_size,
        }
    }
}

impl CrossEncoderLoader for OnnxLoader {
    fn load(&self, model_name: &str, device: Device) -> Result<Arc<dyn CrossEncoder>> {
        let model_path = self.model_dir.join(model_name).join("model.onnx");
        let encoder = onnx::OnnxCrossEncoder::new(&model_path, device, self.max_passage_chars)?;
        Ok(wrap_cache(Arc::new(encoder), self.cache_size))
    }
}

/// Hands out the model-free lexical scorer regardless of model name.
pub struct LexicalLoader {
    dim: usize,
    cache_size: usize,
}

impl LexicalLoader {
    pub fn new(dim: usize, cache_size: usize) -> Self {
        Self { dim, cache_size }
    }
}

impl CrossEncoderLoader for LexicalLoader {
    fn load(&self, model_name: &str, _device: Device) -> Result<Arc<dyn CrossEncoder>> {
        tracing::debug!(model = model_name, "Using lexical cross-encoder");
        Ok(wrap_cache(
            Arc::new(lexical::LexicalCrossEncoder::new(self.dim)),
            self.cache_size,
        ))
    }
}

fn wrap_cache(inner: Arc<dyn CrossEncoder>, cache_size: usize) -> Arc<dyn CrossEncoder> {
    if cache_size == 0 {
        inner
    } else {
        Arc::new(cache::CachedCrossEncoder::new(inner, cache_size))
    }
}

/// Pick the text backend loader from config.
pub fn create_cross_encoder_loader(config: &Config) -> Arc<dyn CrossEncoderLoader> {
    match config.backend {
        ScoringBackend::Onnx => Arc::new(OnnxLoader::new(
            config.model_dir.clone(),
            config.max_passage_chars,
            config.cache_size,
        )),
        ScoringBackend::Lexical => Arc::new(LexicalLoader::new(
            lexical::DEFAULT_DIM,
            config.cache_size,
        )),
    }
}
