//! Extraction pipeline orchestrator.
//!
//! One entry point for callers: resolve the cache, seed the context with
//! a single fetch, detect the platform once, then walk the step registry
//! in priority order until a step produces a validated result. The first
//! validated success is scored, tagged with its method, cached, and
//! returned; later steps never run.
//!
//! Batch scraping fans the same flow out over a bounded concurrent
//! stream and materializes per-URL failures instead of propagating them.

use crate::detect::PlatformDetector;
use crate::fetch::{FetchClient, FetchConfig, canonicalize, normalize_for_cache};
use crate::steps::{ExtractionStep, IframeStep, PlatformStep, StaticHtmlStep, StepRegistry};
use crate::validate::{Validator, score_links};
use joblens_core::{
    AppConfig, BatchOutcome, DebugArtifacts, DebugCapturer, Dictionary, Error, ExtractionResult, MemoryCache,
    NoopCapturer, PipelineContext, ResultCache, ScrapeFailure, ScrapeOptions, compute_cache_key,
};
use chrono::Utc;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[cfg(feature = "render")]
use crate::render::BrowserHandle;
#[cfg(feature = "render")]
use crate::steps::HeadlessStep;

/// Builder for [`Pipeline`]. Collaborators not supplied fall back to the
/// in-memory cache and the no-op debug capturer.
pub struct PipelineBuilder {
    config: AppConfig,
    dictionary: Arc<Dictionary>,
    cache: Option<Arc<dyn ResultCache>>,
    capturer: Option<Arc<dyn DebugCapturer>>,
    registry: Option<StepRegistry>,
}

impl PipelineBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            dictionary: Arc::new(Dictionary::english()),
            cache: None,
            capturer: None,
            registry: None,
        }
    }

    /// Replace the built-in English dictionary.
    pub fn dictionary(mut self, dictionary: Arc<Dictionary>) -> Self {
        self.dictionary = dictionary;
        self
    }

    /// Use a persistent or shared result cache.
    pub fn cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Attach a debug capturer for failed attempts.
    pub fn capturer(mut self, capturer: Arc<dyn DebugCapturer>) -> Self {
        self.capturer = Some(capturer);
        self
    }

    /// Supply a custom step registry instead of the default one.
    pub fn registry(mut self, registry: StepRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed.
    pub fn build(self) -> Result<Pipeline, Error> {
        let fetch_config = FetchConfig {
            user_agent: self.config.user_agent.clone(),
            max_bytes: self.config.max_bytes,
            timeout: Duration::from_millis(self.config.timeout_ms),
            respect_robots: self.config.respect_robots,
            ..Default::default()
        };
        let fetch = Arc::new(FetchClient::new(fetch_config)?);
        let detector = Arc::new(PlatformDetector::new(self.dictionary.clone()));

        #[cfg(feature = "render")]
        let browser = self.config.render_enabled.then(|| Arc::new(BrowserHandle::new()));

        let registry = match self.registry {
            Some(registry) => registry,
            None => {
                let mut registry = StepRegistry::new();
                registry.register(Arc::new(StaticHtmlStep::new(fetch.clone(), self.dictionary.clone())));

                for (index, signature) in self.dictionary.known_platforms().iter().enumerate() {
                    let step = PlatformStep::new(
                        signature.clone(),
                        index as u32,
                        fetch.clone(),
                        self.dictionary.clone(),
                        detector.clone(),
                    );
                    #[cfg(feature = "render")]
                    let step = match &browser {
                        Some(browser) => step.with_browser(browser.clone()),
                        None => step,
                    };
                    registry.register(Arc::new(step));
                }

                #[cfg(feature = "render")]
                if let Some(browser) = &browser {
                    registry.register(Arc::new(HeadlessStep::new(browser.clone(), self.dictionary.clone())));
                }

                let iframe = IframeStep::new(fetch.clone(), self.dictionary.clone());
                #[cfg(feature = "render")]
                let iframe = match &browser {
                    Some(browser) => iframe.with_browser(browser.clone()),
                    None => iframe,
                };
                registry.register(Arc::new(iframe));

                registry
            }
        };

        Ok(Pipeline {
            fetch,
            dictionary: self.dictionary,
            detector,
            registry,
            validator: Validator::default(),
            cache: self.cache.unwrap_or_else(|| Arc::new(MemoryCache::new())),
            capturer: self.capturer.unwrap_or_else(|| Arc::new(NoopCapturer)),
            cache_ttl: Duration::from_secs(self.config.cache_ttl_secs),
            batch_concurrency: self.config.batch_concurrency.max(1),
            #[cfg(feature = "render")]
            browser,
        })
    }
}

/// Cache-first, step-ordered extraction pipeline.
pub struct Pipeline {
    fetch: Arc<FetchClient>,
    dictionary: Arc<Dictionary>,
    detector: Arc<PlatformDetector>,
    registry: StepRegistry,
    validator: Validator,
    cache: Arc<dyn ResultCache>,
    capturer: Arc<dyn DebugCapturer>,
    cache_ttl: Duration,
    batch_concurrency: usize,
    #[cfg(feature = "render")]
    browser: Option<Arc<BrowserHandle>>,
}

impl Pipeline {
    /// Scrape one URL.
    ///
    /// Returns `Ok(None)` when every applicable step ran and none
    /// produced a validated result.
    ///
    /// # Errors
    ///
    /// Only pipeline-level faults: an unusable URL or a cache read
    /// failure. Individual step errors are absorbed and logged.
    pub async fn scrape(&self, url_str: &str, opts: &ScrapeOptions) -> Result<Option<ExtractionResult>, Error> {
        let url = canonicalize(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let normalized = normalize_for_cache(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let key = compute_cache_key(&normalized, &opts.language);

        if !opts.force_refresh
            && let Some(hit) = self.cache.get(&key).await?
        {
            tracing::debug!("cache hit for {url}");
            return Ok(Some(hit));
        }

        let mut ctx = PipelineContext::default();

        // One seed fetch per call; steps reuse the HTML through the
        // context instead of refetching.
        match self.fetch.fetch(url.as_str()).await {
            Ok(response) if response.is_html() => ctx.html_content = Some(response.text()),
            Ok(_) => tracing::debug!("seed fetch for {url} returned non-HTML content"),
            Err(e) => tracing::debug!("seed fetch for {url} failed: {e}"),
        }

        ctx.detected_platform = self
            .detector
            .detect(url.as_str(), ctx.html_content.as_deref())
            .map(|sig| sig.name.clone());

        for step in self.registry.steps() {
            if !step.is_applicable(&url, &ctx) {
                continue;
            }
            tracing::debug!("running step {} for {url}", step.name());

            match step.scrape(&url, opts, &ctx).await {
                Ok(Some(result)) => {
                    ctx.previous_step_result = Some(result.clone());

                    match self.validator.validate(&result, &self.dictionary) {
                        Ok(()) => {
                            if let Some(validated) = self.finalize(step.as_ref(), result, opts, &ctx) {
                                if let Err(e) =
                                    self.cache.put(&key, &validated, &opts.language, Some(self.cache_ttl)).await
                                {
                                    tracing::warn!("cache write for {url} failed: {e}");
                                }
                                return Ok(Some(validated));
                            }
                            tracing::debug!("step {} result had no relevant links", step.name());
                        }
                        Err(reason) => {
                            tracing::debug!("step {} result rejected: {reason}", step.name());
                            self.offer_debug(step.name(), &url, &ctx, true, Some(&reason.to_string())).await;
                        }
                    }
                }
                Ok(None) => {
                    tracing::debug!("step {} found nothing for {url}", step.name());
                }
                Err(e) => {
                    tracing::warn!("step {} failed for {url}: {e}", step.name());
                    self.offer_debug(step.name(), &url, &ctx, false, Some(&e.to_string())).await;
                }
            }
        }

        self.offer_debug("pipeline", &url, &ctx, false, Some("all steps exhausted")).await;
        Ok(None)
    }

    /// Scrape many URLs with bounded concurrency.
    ///
    /// Outcomes come back in input order; a failing URL never aborts its
    /// siblings.
    pub async fn scrape_batch(&self, urls: &[String], opts: &ScrapeOptions) -> Vec<BatchOutcome> {
        let mut outcomes: Vec<(usize, BatchOutcome)> = futures_util::stream::iter(
            urls.iter().enumerate().map(|(index, url)| async move {
                let outcome = match self.scrape(url, opts).await {
                    Ok(Some(result)) => BatchOutcome::Extracted(result),
                    Ok(None) => BatchOutcome::NoResult { url: url.clone() },
                    Err(e) => BatchOutcome::Failed(ScrapeFailure {
                        url: url.clone(),
                        error: e.to_string(),
                        scraped_at: Utc::now(),
                    }),
                };
                (index, outcome)
            }),
        )
        .buffer_unordered(self.batch_concurrency)
        .collect()
        .await;

        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    /// Registered steps in execution order.
    pub fn steps(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn fetch_client(&self) -> &FetchClient {
        &self.fetch
    }

    /// Release the shared browser, if one was launched.
    #[cfg(feature = "render")]
    pub async fn shutdown(&self) {
        if let Some(browser) = &self.browser {
            browser.shutdown().await;
        }
    }

    /// Score and tag a structurally valid result. `None` means every
    /// candidate link fell below the caller's relevance bar.
    fn finalize(
        &self, step: &dyn ExtractionStep, result: ExtractionResult, opts: &ScrapeOptions, ctx: &PipelineContext,
    ) -> Option<ExtractionResult> {
        let links = score_links(
            &result.links,
            &result.text,
            &opts.search_terms,
            &opts.search_locations,
            &self.dictionary,
            opts.strict_mode,
        );
        if !opts.search_terms.is_empty() && links.is_empty() {
            return None;
        }

        let mut validated = result;
        validated.links = links;
        validated.method = Some(step.name().to_string());
        validated.detected_platform = ctx.detected_platform.clone();
        Some(validated)
    }

    async fn offer_debug(&self, step: &str, url: &Url, ctx: &PipelineContext, had_result: bool, error: Option<&str>) {
        if !self.capturer.should_export(step, had_result, error) {
            return;
        }

        self.capturer
            .export(DebugArtifacts {
                url: url.to_string(),
                step: step.to_string(),
                html: ctx.html_content.clone(),
                screenshot: None,
                note: error.map(String::from),
                captured_at: Utc::now(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use joblens_core::{JobLink, LinkType};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Step double with a call counter, scripted applicability, and a
    /// scripted outcome.
    struct SpyStep {
        name: &'static str,
        priority: u32,
        applicable: bool,
        calls: AtomicU32,
        outcome: SpyOutcome,
    }

    enum SpyOutcome {
        Result(Box<ExtractionResult>),
        Miss,
        Fail,
    }

    impl SpyStep {
        fn new(name: &'static str, priority: u32, outcome: SpyOutcome) -> Self {
            Self { name, priority, applicable: true, calls: AtomicU32::new(0), outcome }
        }

        fn inapplicable(mut self) -> Self {
            self.applicable = false;
            self
        }
    }

    #[async_trait]
    impl ExtractionStep for SpyStep {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        fn is_applicable(&self, _url: &Url, _ctx: &PipelineContext) -> bool {
            self.applicable
        }

        async fn scrape(
            &self, _url: &Url, _opts: &ScrapeOptions, _ctx: &PipelineContext,
        ) -> Result<Option<ExtractionResult>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.outcome {
                SpyOutcome::Result(result) => Ok(Some((**result).clone())),
                SpyOutcome::Miss => Ok(None),
                SpyOutcome::Fail => Err(Error::HttpError("status 503".to_string())),
            }
        }
    }

    /// A result that passes structural validation.
    fn valid_result(url: &str) -> ExtractionResult {
        ExtractionResult::new(
            url,
            "Careers at Acme. We are hiring across many teams, browse the open positions below and apply today.",
            vec![JobLink::new(
                format!("{url}/jobs/1"),
                "Senior Backend Engineer",
                LinkType::JobPosting,
                0.6,
            )],
        )
    }

    fn pipeline_with(steps: Vec<Arc<dyn ExtractionStep>>) -> Pipeline {
        let mut registry = StepRegistry::new();
        for step in steps {
            registry.register(step);
        }
        PipelineBuilder::new(AppConfig::default()).registry(registry).build().unwrap()
    }

    // Seed fetches in these tests target `.invalid` hosts, which cannot
    // resolve; the pipeline is expected to shrug that off.
    const URL: &str = "https://joblens.invalid/careers";

    #[tokio::test]
    async fn test_first_validated_result_short_circuits() {
        let first = Arc::new(SpyStep::new("static_html", 10, SpyOutcome::Result(Box::new(valid_result(URL)))));
        let second = Arc::new(SpyStep::new("headless", 50, SpyOutcome::Result(Box::new(valid_result(URL)))));
        let pipeline = pipeline_with(vec![first.clone(), second.clone()]);

        let result = pipeline.scrape(URL, &ScrapeOptions::default()).await.unwrap().unwrap();

        assert_eq!(result.method.as_deref(), Some("static_html"));
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_inapplicable_step_skipped_without_scraping() {
        // Lower-priority step declines; the next one runs and its method
        // name tags the result.
        let declining = Arc::new(
            SpyStep::new("static_html", 10, SpyOutcome::Result(Box::new(valid_result(URL)))).inapplicable(),
        );
        let applicable = Arc::new(SpyStep::new("headless", 50, SpyOutcome::Result(Box::new(valid_result(URL)))));
        let pipeline = pipeline_with(vec![declining.clone(), applicable.clone()]);

        let result = pipeline.scrape(URL, &ScrapeOptions::default()).await.unwrap().unwrap();

        assert_eq!(result.method.as_deref(), Some("headless"));
        assert_eq!(declining.calls.load(Ordering::SeqCst), 0);
        assert_eq!(applicable.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_step_error_does_not_abort_pipeline() {
        let failing = Arc::new(SpyStep::new("static_html", 10, SpyOutcome::Fail));
        let fallback = Arc::new(SpyStep::new("headless", 50, SpyOutcome::Result(Box::new(valid_result(URL)))));
        let pipeline = pipeline_with(vec![failing.clone(), fallback.clone()]);

        let result = pipeline.scrape(URL, &ScrapeOptions::default()).await.unwrap().unwrap();

        assert_eq!(result.method.as_deref(), Some("headless"));
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_none() {
        let miss = Arc::new(SpyStep::new("static_html", 10, SpyOutcome::Miss));
        let pipeline = pipeline_with(vec![miss]);

        let result = pipeline.scrape(URL, &ScrapeOptions::default()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_cache_hit_bypasses_steps() {
        let step = Arc::new(SpyStep::new("static_html", 10, SpyOutcome::Result(Box::new(valid_result(URL)))));
        let pipeline = pipeline_with(vec![step.clone()]);

        let first = pipeline.scrape(URL, &ScrapeOptions::default()).await.unwrap().unwrap();
        let second = pipeline.scrape(URL, &ScrapeOptions::default()).await.unwrap().unwrap();

        assert_eq!(step.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.links.len(), second.links.len());
        assert_eq!(second.method.as_deref(), Some("static_html"));
    }

    #[tokio::test]
    async fn test_force_refresh_skips_cache() {
        let step = Arc::new(SpyStep::new("static_html", 10, SpyOutcome::Result(Box::new(valid_result(URL)))));
        let pipeline = pipeline_with(vec![step.clone()]);
        let opts = ScrapeOptions { force_refresh: true, ..Default::default() };

        pipeline.scrape(URL, &opts).await.unwrap();
        pipeline.scrape(URL, &opts).await.unwrap();

        assert_eq!(step.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_repeated_runs_are_stable() {
        let step = Arc::new(SpyStep::new("static_html", 10, SpyOutcome::Result(Box::new(valid_result(URL)))));
        let pipeline = pipeline_with(vec![step]);
        let opts = ScrapeOptions {
            force_refresh: true,
            search_terms: vec!["backend engineer".to_string()],
            ..Default::default()
        };

        let a = pipeline.scrape(URL, &opts).await.unwrap().unwrap();
        let b = pipeline.scrape(URL, &opts).await.unwrap().unwrap();

        assert_eq!(a.links.len(), b.links.len());
        for (la, lb) in a.links.iter().zip(b.links.iter()) {
            assert_eq!(la.url, lb.url);
            assert_eq!(la.confidence, lb.confidence);
            assert_eq!(la.match_type, lb.match_type);
        }
    }

    #[tokio::test]
    async fn test_relevance_scoring_applied_to_result() {
        let step = Arc::new(SpyStep::new("static_html", 10, SpyOutcome::Result(Box::new(valid_result(URL)))));
        let pipeline = pipeline_with(vec![step]);
        let opts = ScrapeOptions { search_terms: vec!["backend engineer".to_string()], ..Default::default() };

        let result = pipeline.scrape(URL, &opts).await.unwrap().unwrap();

        assert_eq!(result.links.len(), 1);
        assert!(result.links[0].confidence >= 0.7);
        assert!(result.links[0].match_type.is_some());
    }

    #[tokio::test]
    async fn test_irrelevant_result_treated_as_miss() {
        let step = Arc::new(SpyStep::new("static_html", 10, SpyOutcome::Result(Box::new(valid_result(URL)))));
        let pipeline = pipeline_with(vec![step]);
        let opts = ScrapeOptions { search_terms: vec!["underwater basket weaver".to_string()], ..Default::default() };

        let result = pipeline.scrape(URL, &opts).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_invalid_url_is_pipeline_error() {
        let pipeline = pipeline_with(vec![]);
        let result = pipeline.scrape("", &ScrapeOptions::default()).await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_batch_isolates_failures_and_keeps_order() {
        let step = Arc::new(SpyStep::new("static_html", 10, SpyOutcome::Result(Box::new(valid_result(URL)))));
        let pipeline = pipeline_with(vec![step]);

        let urls = vec![URL.to_string(), "".to_string(), "https://other.invalid/jobs".to_string()];
        let outcomes = pipeline.scrape_batch(&urls, &ScrapeOptions::default()).await;

        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[0], BatchOutcome::Extracted(_)));
        assert!(matches!(outcomes[1], BatchOutcome::Failed(_)));
        assert!(matches!(outcomes[2], BatchOutcome::Extracted(_)));
    }

    #[tokio::test]
    async fn test_default_registry_covers_all_bands() {
        let pipeline = PipelineBuilder::new(AppConfig::default()).build().unwrap();
        let names: Vec<&str> = pipeline.steps().steps().iter().map(|s| s.name()).collect();

        assert_eq!(names.first().copied(), Some("static_html"));
        assert!(names.iter().any(|n| *n == "platform:greenhouse"));
        assert!(names.iter().any(|n| *n == "iframe"));

        // Platform steps keep dictionary declaration order.
        let greenhouse = names.iter().position(|n| *n == "platform:greenhouse").unwrap();
        let lever = names.iter().position(|n| *n == "platform:lever").unwrap();
        assert!(greenhouse < lever);
    }
}
