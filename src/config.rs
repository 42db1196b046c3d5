use crate::path::{self, Utf8PathBuf};
use crate::scoring::Device;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_MODEL: &str = "cross-encoder/ms-marco-MiniLM-L-6-v2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringBackend {
    Onnx,
    Lexical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model_name: String,
    pub device: Device,
    pub backend: ScoringBackend,
    pub model_dir: Utf8PathBuf,
    pub searchable_fields: Option<Vec<String>>,
    pub num_highlights: usize,
    pub overwrite: bool,
    pub sort_results: bool,
    pub cache_size: usize,
    pub max_passage_chars: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let model_name = optional_env("RERANK_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let device = optional_env("RERANK_DEVICE")
            .as_deref()
            .map(|raw| raw.parse::<Device>().context("Invalid RERANK_DEVICE"))
            .transpose()?
            .unwrap_or(Device::Cpu);

        let backend = optional_env("RERANK_BACKEND")
            .as_deref()
            .map(|raw| parse_backend(raw).context("Invalid RERANK_BACKEND"))
            .transpose()?
            .unwrap_or(ScoringBackend::Onnx);

        let model_dir_raw =
            optional_env("RERANK_MODEL_DIR").unwrap_or_else(|| "./.rerank/models".to_string());
        let model_dir = path::resolve_from_cwd(&model_dir_raw)
            .with_context(|| format!("Invalid RERANK_MODEL_DIR: {model_dir_raw}"))?;

        // Unset means unrestricted; an explicitly empty list is kept as-is
        let searchable_fields = env::var("RERANK_SEARCHABLE_FIELDS")
            .ok()
            .map(|raw| parse_csv(&raw));

        let num_highlights = optional_env("RERANK_NUM_HIGHLIGHTS")
            .as_deref()
            .map(|raw| parse_usize(raw).context("Invalid RERANK_NUM_HIGHLIGHTS"))
            .transpose()?
            .unwrap_or(1);

        let overwrite = optional_env("RERANK_OVERWRITE")
            .as_deref()
            .map(|raw| parse_bool(raw).context("Invalid RERANK_OVERWRITE"))
            .transpose()?
            .unwrap_or(true);

        let sort_results = optional_env("RERANK_SORT")
            .as_deref()
            .map(|raw| parse_bool(raw).context("Invalid RERANK_SORT"))
            .transpose()?
            .unwrap_or(true);

        let cache_size = optional_env("RERANK_CACHE_SIZE")
            .as_deref()
            .map(|raw| parse_usize(raw).context("Invalid RERANK_CACHE_SIZE"))
            .transpose()?
            .unwrap_or(256);

        let max_passage_chars = optional_env("RERANK_MAX_PASSAGE_CHARS")
            .as_deref()
            .map(|raw| parse_usize(raw).context("Invalid RERANK_MAX_PASSAGE_CHARS"))
            .transpose()?
            .unwrap_or(2000);

        Ok(Self {
            model_name,
            device,
            backend,
            model_dir,
            searchable_fields,
            num_highlights,
            overwrite,
            sort_results,
            cache_size,
            max_passage_chars,
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|v| {
        let v = v.trim().to_string();
        if v.is_empty() {
            None
        } else {
            Some(v)
        }
    })
}

fn parse_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn parse_backend(value: &str) -> Result<ScoringBackend> {
    match value.trim().to_lowercase().as_str() {
        "onnx" => Ok(ScoringBackend::Onnx),
        "lexical" => Ok(ScoringBackend::Lexical),
        other => Err(anyhow!("Unknown scoring backend '{other}'")),
    }
}

fn parse_usize(value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|err| anyhow!("Invalid integer '{value}': {err}"))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        other => Err(anyhow!("Invalid boolean '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for k in [
            "RERANK_MODEL",
            "RERANK_DEVICE",
            "RERANK_BACKEND",
            "RERANK_MODEL_DIR",
            "RERANK_SEARCHABLE_FIELDS",
            "RERANK_NUM_HIGHLIGHTS",
            "RERANK_OVERWRITE",
            "RERANK_SORT",
            "RERANK_CACHE_SIZE",
            "RERANK_MAX_PASSAGE_CHARS",
        ] {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn defaults_without_env() {
        let _g = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.model_name, DEFAULT_MODEL);
        assert_eq!(cfg.device, Device::Cpu);
        assert_eq!(cfg.backend, ScoringBackend::Onnx);
        assert!(cfg.model_dir.is_absolute());
        assert!(cfg.model_dir.ends_with(".rerank/models"));
        assert!(cfg.searchable_fields.is_none());
        assert_eq!(cfg.num_highlights, 1);
        assert!(cfg.overwrite);
        assert!(cfg.sort_results);
        assert_eq!(cfg.cache_size, 256);
        assert_eq!(cfg.max_passage_chars, 2000);
    }

    #[test]
    fn searchable_fields_parse_and_trim() {
        let _g = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("RERANK_SEARCHABLE_FIELDS", " title , ,desc ");

        let cfg = Config::from_env().unwrap();
        assert_eq!(
            cfg.searchable_fields,
            Some(vec!["title".to_string(), "desc".to_string()])
        );
    }

    #[test]
    fn empty_searchable_fields_stay_restricted() {
        let _g = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("RERANK_SEARCHABLE_FIELDS", "");

        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.searchable_fields, Some(vec![]));
    }

    #[test]
    fn device_and_backend_are_validated() {
        let _g = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("RERANK_DEVICE", "tpu");
        let err = format!("{:#}", Config::from_env().unwrap_err());
        assert!(err.contains("RERANK_DEVICE"));

        std::env::set_var("RERANK_DEVICE", "cuda:1");
        std::env::set_var("RERANK_BACKEND", "magic");
        let err = Config::from_env().unwrap_err().to_string();
        assert!(err.contains("RERANK_BACKEND"));

        std::env::set_var("RERANK_BACKEND", "Lexical");
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.device, Device::Cuda(1));
        assert_eq!(cfg.backend, ScoringBackend::Lexical);
    }

    #[test]
    fn bool_parsing_accepts_multiple_spellings() {
        let _g = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("RERANK_OVERWRITE", "no");
        std::env::set_var("RERANK_SORT", "0");
        let cfg = Config::from_env().unwrap();
        assert!(!cfg.overwrite);
        assert!(!cfg.sort_results);

        std::env::set_var("RERANK_OVERWRITE", "maybe");
        let err = format!("{:#}", Config::from_env().unwrap_err());
        assert!(err.contains("RERANK_OVERWRITE"));
        assert!(err.contains("maybe"));
    }

    #[test]
    fn absolute_model_dir_is_kept() {
        let _g = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().to_string_lossy().to_string();
        std::env::set_var("RERANK_MODEL_DIR", &raw);

        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.model_dir.as_str(), raw);
    }

    #[test]
    fn numeric_settings() {
        let _g = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("RERANK_NUM_HIGHLIGHTS", "0");
        std::env::set_var("RERANK_CACHE_SIZE", "0");
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.num_highlights, 0);
        assert_eq!(cfg.cache_size, 0);

        std::env::set_var("RERANK_NUM_HIGHLIGHTS", "-1");
        let err = format!("{:#}", Config::from_env().unwrap_err());
        assert!(err.contains("RERANK_NUM_HIGHLIGHTS"));

        std::env::set_var("RERANK_NUM_HIGHLIGHTS", "2");
        std::env::set_var("RERANK_MAX_PASSAGE_CHARS", "lots");
        let err = format!("{:#}", Config::from_env().unwrap_err());
        assert!(err.contains("RERANK_MAX_PASSAGE_CHARS"));
    }
}
