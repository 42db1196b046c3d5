pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod path;
pub mod rerank;
pub mod results;
pub mod scoring;

pub use error::RerankerError;
pub use rerank::{is_applicable, RerankOutcome, RerankRequest, Reranker};
pub use results::{finalize, Hit, RerankScratch, ResultSet};
