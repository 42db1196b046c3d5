//! CLI argument parsing, help text, and the stdin-to-stdout rerank run

use crate::config::Config;
use crate::rerank::{RerankOutcome, RerankRequest, Reranker};
use crate::results::ResultSet;
use anyhow::{anyhow, Context, Result};
use std::io::{Read, Write};

pub fn wants_help(args: &[String]) -> bool {
    flag_args(args).any(|a| a == "-h" || a == "--help" || a == "help")
}

pub fn wants_version(args: &[String]) -> bool {
    flag_args(args).any(|a| a == "-V" || a == "--version" || a == "version")
}

pub fn wants_metrics(args: &[String]) -> bool {
    flag_args(args).any(|a| a == "--metrics")
}

/// Arguments before a `--` separator.
fn flag_args(args: &[String]) -> impl Iterator<Item = &String> {
    args.iter().skip(1).take_while(|a| a.as_str() != "--")
}

/// The query is the single positional argument. Everything after `--` is
/// positional, so queries starting with `-` can be passed.
pub fn query_from_args(args: &[String]) -> Result<String> {
    let rest = args.get(1..).unwrap_or_default();
    let (flags, verbatim) = match rest.iter().position(|a| a == "--") {
        Some(split) => (&rest[..split], &rest[split + 1..]),
        None => (rest, &rest[rest.len()..]),
    };

    let mut positional = flags
        .iter()
        .filter(|a| !a.starts_with('-'))
        .chain(verbatim.iter());
    let query = positional
        .next()
        .ok_or_else(|| anyhow!("Missing query argument (see --help)"))?;
    if positional.next().is_some() {
        return Err(anyhow!("Expected a single query argument; quote multi-word queries"));
    }
    Ok(query.clone())
}

pub fn print_help() {
    println!("search-rerank");
    println!();
    println!("Rerank search results read as JSON from stdin; writes the result set to stdout.");
    println!();
    println!("Usage:");
    println!("  search-rerank <query> < results.json");
    println!("  search-rerank <query> --metrics < results.json");
    println!("  search-rerank -- <query starting with -> < results.json");
    println!("  search-rerank --help");
    println!("  search-rerank --version");
    println!();
    println!("Input: {{\"hits\": [{{...document fields, \"original_score\": 0.4}}, ...]}}");
    println!();
    println!("Common env (defaults shown):");
    println!("  RERANK_MODEL=cross-encoder/ms-marco-MiniLM-L-6-v2  (names containing 'owl' select image reranking)");
    println!("  RERANK_DEVICE=cpu|cuda|cuda:N|metal       (default: cpu)");
    println!("  RERANK_BACKEND=onnx|lexical               (default: onnx)");
    println!("  RERANK_MODEL_DIR=./.rerank/models         (<dir>/<model>/model.onnx + tokenizer.json)");
    println!("  RERANK_SEARCHABLE_FIELDS=title,body       (default: all text fields)");
    println!("  RERANK_NUM_HIGHLIGHTS=1");
    println!("  RERANK_OVERWRITE=true|false               (default: true)");
    println!("  RERANK_SORT=true|false                    (default: true)");
    println!("  RERANK_CACHE_SIZE=256                     (0 disables score caching)");
    println!("  RERANK_MAX_PASSAGE_CHARS=2000");
    println!("  RUST_LOG=info                             (logs go to stderr)");
}

pub fn print_version() {
    println!("{}", env!("CARGO_PKG_VERSION"));
}

/// Read a result set from `input`, rerank it, and write it to `output`.
///
/// Hits are re-sorted by score afterwards only when `config.sort_results`
/// is set and the reranked scores were promoted.
pub fn run<R: Read, W: Write>(
    config: &Config,
    reranker: &Reranker,
    query: &str,
    input: R,
    mut output: W,
) -> Result<RerankOutcome> {
    let mut results: ResultSet =
        serde_json::from_reader(input).context("Failed to parse result set from input")?;

    let request = RerankRequest::from_config(query, config);
    let outcome = reranker.rerank(&mut results, &request)?;

    if config.sort_results && matches!(outcome, RerankOutcome::Reranked { finalized: true, .. }) {
        results.sort_by_score();
    }

    serde_json::to_writer_pretty(&mut output, &results).context("Failed to write result set")?;
    writeln!(output)?;
    Ok(outcome)
}
