//! ONNX-based cross-encoder using the ort runtime

use super::{CrossEncoder, Device};
use crate::path::Utf8Path;
use anyhow::{anyhow, Context, Result};
use ndarray::Array2;
use ort::{inputs, Session};
use tokenizers::Tokenizer;

const MAX_SEQUENCE_LENGTH: usize = 512;

/// Cross-encoder running a sequence-classification model under ONNX Runtime.
pub struct OnnxCrossEncoder {
    session: Session,
    tokenizer: Tokenizer,
    needs_token_types: bool,
    max_passage_chars: usize,
}

impl OnnxCrossEncoder {
    /// Load `model.onnx` plus the `tokenizer.json` sitting next to it.
    pub fn new(model_path: &Utf8Path, device: Device, max_passage_chars: usize) -> Result<Self> {
        if !model_path.exists() {
            return Err(anyhow!("Cross-encoder model not found: {}", model_path));
        }
        tracing::info!(model = %model_path, %device, "Loading cross-encoder");

        let session = Session::builder()?
            .with_execution_providers(execution_providers(device))?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load cross-encoder ONNX model {model_path}"))?;

        let tokenizer_path = model_path
            .parent()
            .map(|p| p.join("tokenizer.json"))
            .filter(|p| p.exists())
            .ok_or_else(|| anyhow!("No tokenizer.json next to {}", model_path))?;
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer {}: {}", tokenizer_path, e))?;

        let needs_token_types = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");

        Ok(Self {
            session,
            tokenizer,
            needs_token_types,
            max_passage_chars,
        })
    }

    fn score_pair(&self, query: &str, passage: &str) -> Result<f32> {
        let passage: String = passage.chars().take(self.max_passage_chars).collect();
        let encoding = self
            .tokenizer
            .encode((query, passage.as_str()), true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let ids = truncated(encoding.get_ids());
        let attention_mask = truncated(encoding.get_attention_mask());
        let type_ids = truncated(encoding.get_type_ids());

        let seq_len = ids.len();
        if seq_len == 0 {
            return Ok(0.0);
        }

        let ids_array = Array2::from_shape_vec((1, seq_len), ids)?;
        let mask_array = Array2::from_shape_vec((1, seq_len), attention_mask)?;

        let outputs = if self.needs_token_types {
            let type_array = Array2::from_shape_vec((1, seq_len), type_ids)?;
            self.session.run(inputs![
                "input_ids" => ids_array,
                "attention_mask" => mask_array,
                "token_type_ids" => type_array,
            ]?)?
        } else {
            self.session.run(inputs![
                "input_ids" => ids_array,
                "attention_mask" => mask_array,
            ]?)?
        };

        let logits = outputs[0].try_extract_tensor::<f32>()?;
        let logit = logits.iter().next().copied().unwrap_or(0.0);
        Ok(sigmoid(logit))
    }
}

impl CrossEncoder for OnnxCrossEncoder {
    fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        passages
            .iter()
            .map(|passage| self.score_pair(query, passage))
            .collect()
    }
}

fn execution_providers(device: Device) -> Vec<ort::ExecutionProviderDispatch> {
    use ort::{
        CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider,
    };

    let mut providers = Vec::new();
    match device {
        Device::Cuda(ordinal) => providers.push(
            CUDAExecutionProvider::default()
                .with_device_id(ordinal as i32)
                .build(),
        ),
        Device::Metal => providers.push(CoreMLExecutionProvider::default().build()),
        Device::Cpu => {}
    }
    // ort falls through to the next provider when one is unavailable
    providers.push(CPUExecutionProvider::default().build());
    providers
}

fn truncated(values: &[u32]) -> Vec<i64> {
    values
        .iter()
        .take(MAX_SEQUENCE_LENGTH)
        .map(|&x| x as i64)
        .collect()
}

fn sigmoid(logit: f32) -> f32 {
    1.0 / (1.0 + (-logit).exp())
}
