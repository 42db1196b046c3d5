//! Model-family resolution and strategy construction.
//!
//! Families are consulted in registration order; the first one that claims a
//! model name wins. When nobody claims it the registry falls back to its
//! default family, which for [`StrategyRegistry::builtin`] is `text`.

use super::owl::OwlFamily;
use super::text::TextFamily;
use crate::results::ResultSet;
use crate::scoring::{CrossEncoderLoader, Device, RegionScorerLoader};
use anyhow::Result;
use std::sync::Arc;

/// A model-family-specific reranking implementation.
///
/// Implementations write scratch values onto the hits they score and leave
/// every other hit exactly as received. Returns the number of hits scored.
pub trait RerankStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn rerank(
        &self,
        query: &str,
        results: &mut ResultSet,
        fields: Option<&[String]>,
    ) -> Result<usize>;
}

/// What a family needs to build a strategy.
#[derive(Debug, Clone, Copy)]
pub struct StrategySpec<'a> {
    pub model_name: &'a str,
    pub device: Device,
    pub searchable_fields: Option<&'a [String]>,
    pub num_highlights: usize,
}

/// Capability interface of a model family.
pub trait StrategyFamily: Send + Sync {
    fn tag(&self) -> &'static str;

    /// Whether this family handles `model_name`.
    fn claims(&self, model_name: &str) -> bool;

    /// Validate preconditions and build the strategy. Must not touch results.
    fn build(&self, spec: &StrategySpec<'_>) -> Result<Box<dyn RerankStrategy>>;
}

pub struct StrategyRegistry {
    families: Vec<Arc<dyn StrategyFamily>>,
    default: Arc<dyn StrategyFamily>,
}

impl StrategyRegistry {
    pub fn new(default: Arc<dyn StrategyFamily>) -> Self {
        Self {
            families: Vec::new(),
            default,
        }
    }

    /// Text as the default family, owl registered ahead of it.
    pub fn builtin(
        text_loader: Arc<dyn CrossEncoderLoader>,
        region_loader: Option<Arc<dyn RegionScorerLoader>>,
    ) -> Self {
        Self::new(Arc::new(TextFamily::new(text_loader)))
            .with_family(Arc::new(OwlFamily::new(region_loader)))
    }

    pub fn with_family(mut self, family: Arc<dyn StrategyFamily>) -> Self {
        self.register(family);
        self
    }

    pub fn register(&mut self, family: Arc<dyn StrategyFamily>) -> &mut Self {
        self.families.push(family);
        self
    }

    pub fn resolve(&self, model_name: &str) -> &dyn StrategyFamily {
        self.families
            .iter()
            .find(|family| family.claims(model_name))
            .unwrap_or(&self.default)
            .as_ref()
    }

    /// Family tags in resolution order, default last.
    pub fn tags(&self) -> Vec<&'static str> {
        self.families
            .iter()
            .map(|f| f.tag())
            .chain(std::iter::once(self.default.tag()))
            .collect()
    }
}

/// A built strategy bound to the query and field selection it will run with.
pub struct StrategyHandle {
    family: &'static str,
    strategy: Box<dyn RerankStrategy>,
    query: String,
    fields: Option<Vec<String>>,
}

impl StrategyHandle {
    pub fn family(&self) -> &'static str {
        self.family
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    pub fn execute(&self, results: &mut ResultSet) -> Result<usize> {
        self.strategy.rerank(&self.query, results, self.fields.as_deref())
    }
}

/// Select and build the strategy for `spec.model_name`.
///
/// Takes the results by shared reference: dispatch validates and selects,
/// it never mutates. Configuration errors surface here, before any hit is
/// touched.
pub fn dispatch(
    registry: &StrategyRegistry,
    results: &ResultSet,
    query: &str,
    spec: &StrategySpec<'_>,
) -> Result<StrategyHandle> {
    let family = registry.resolve(spec.model_name);
    tracing::debug!(
        family = family.tag(),
        model = spec.model_name,
        device = %spec.device,
        hits = results.len(),
        "Dispatching reranker"
    );

    let strategy = family.build(spec)?;

    Ok(StrategyHandle {
        family: family.tag(),
        strategy,
        query: query.to_string(),
        fields: spec.searchable_fields.map(<[String]>::to_vec),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RerankerError;
    use crate::scoring::lexical::LexicalCrossEncoder;
    use crate::scoring::{CrossEncoder, ImageSize, RegionScore, RegionScorer};
    use rstest::*;
    use test_case::test_case;

    struct Lexical;

    impl CrossEncoderLoader for Lexical {
        fn load(&self, _model_name: &str, _device: Device) -> Result<Arc<dyn CrossEncoder>> {
            Ok(Arc::new(LexicalCrossEncoder::new(64)))
        }
    }

    struct NoRegions;

    impl RegionScorer for NoRegions {
        fn score_regions(&self, _: &str, _: &str, _: ImageSize) -> Result<Vec<RegionScore>> {
            Ok(vec![])
        }
    }

    impl RegionScorerLoader for NoRegions {
        fn load(&self, _model_name: &str, _device: Device) -> Result<Arc<dyn RegionScorer>> {
            Ok(Arc::new(NoRegions))
        }
    }

    struct Named(&'static str, &'static str);

    impl StrategyFamily for Named {
        fn tag(&self) -> &'static str {
            self.0
        }
        fn claims(&self, model_name: &str) -> bool {
            model_name.contains(self.1)
        }
        fn build(&self, _spec: &StrategySpec<'_>) -> Result<Box<dyn RerankStrategy>> {
            anyhow::bail!("not buildable")
        }
    }

    fn builtin_registry() -> StrategyRegistry {
        StrategyRegistry::builtin(Arc::new(Lexical), Some(Arc::new(NoRegions)))
    }

    #[fixture]
    fn registry() -> StrategyRegistry {
        builtin_registry()
    }

    fn spec<'a>(model_name: &'a str, fields: Option<&'a [String]>) -> StrategySpec<'a> {
        StrategySpec {
            model_name,
            device: Device::Cpu,
            searchable_fields: fields,
            num_highlights: 1,
        }
    }

    #[test_case("owl/ViT-B/32", "owl"; "owl lowercase")]
    #[test_case("google/OWLViT-base", "owl"; "owl uppercase")]
    #[test_case("cross-encoder/ms-marco-MiniLM-L-6-v2", "text"; "cross encoder")]
    #[test_case("", "text"; "empty name falls back to default")]
    fn test_resolution(model_name: &str, expected: &str) {
        assert_eq!(builtin_registry().resolve(model_name).tag(), expected);
    }

    #[rstest]
    fn tags_list_default_last(registry: StrategyRegistry) {
        assert_eq!(registry.tags(), vec!["owl", "text"]);
    }

    #[rstest]
    fn first_registered_claim_wins(registry: StrategyRegistry) {
        let registry = registry
            .with_family(Arc::new(Named("first", "vit")))
            .with_family(Arc::new(Named("second", "vit")));
        // owl was registered before both and still wins for owl models
        assert_eq!(registry.resolve("owl-vit").tag(), "owl");
        assert_eq!(registry.resolve("clip-vit").tag(), "first");
    }

    #[test_case(None; "none")]
    #[test_case(Some(vec![]); "empty list")]
    #[test_case(Some(vec![String::new()]); "empty string")]
    #[test_case(Some(vec!["  ".to_string()]); "blank string")]
    fn test_owl_requires_fields(fields: Option<Vec<String>>) {
        let results = ResultSet::default();
        let err = dispatch(
            &builtin_registry(),
            &results,
            "a cat",
            &spec("owl/ViT-B/32", fields.as_deref()),
        )
        .err()
        .unwrap();
        assert!(matches!(
            err.downcast_ref::<RerankerError>(),
            Some(RerankerError::InvalidConfiguration { .. })
        ));
    }

    #[rstest]
    fn owl_dispatch_with_fields(registry: StrategyRegistry) {
        let fields = vec!["image".to_string()];
        let results = ResultSet::default();
        let handle = dispatch(&registry, &results, "a cat", &spec("owl/ViT-B/32", Some(&fields)))
            .unwrap();
        assert_eq!(handle.family(), "owl");
    }

    #[rstest]
    fn owl_without_backend_is_unavailable() {
        let registry = StrategyRegistry::builtin(Arc::new(Lexical), None);
        let fields = vec!["image".to_string()];
        let err = dispatch(
            &registry,
            &ResultSet::default(),
            "a cat",
            &spec("owl/ViT-B/32", Some(&fields)),
        )
        .err()
        .unwrap();
        assert!(matches!(
            err.downcast_ref::<RerankerError>(),
            Some(RerankerError::BackendUnavailable { .. })
        ));
    }

    #[rstest]
    fn text_dispatch_accepts_no_fields(registry: StrategyRegistry) {
        let handle = dispatch(
            &registry,
            &ResultSet::default(),
            "q",
            &spec("cross-encoder/ms-marco", None),
        )
        .unwrap();
        assert_eq!(handle.family(), "text");
        assert_eq!(handle.strategy_name(), "text");
    }
}
