//! Content expansion over a live page.
//!
//! Listing pages hide postings behind "show more" buttons, cookie walls,
//! and paginators. The engine drives an abstract [`PageDriver`] through
//! scan/click/verify rounds until the page stops changing, using the
//! dictionary's control vocabulary to decide what is worth clicking.
//!
//! Progress is judged by comparing [`PageDigest`] values before and after
//! each round instead of trusting individual click outcomes: a click that
//! "succeeds" without changing the digest is non-productive.

use self::dictionary_match::{control_score, is_vetoed};
use joblens_core::{Dictionary, Error};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Cheap structural summary of a rendered page.
///
/// Equality of two digests means the page did not observably change
/// between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDigest {
    /// DOM element count.
    pub element_count: u64,
    /// Document scroll height in pixels.
    pub scroll_height: u64,
    /// Elements matching the job-candidate selectors.
    pub job_matches: u64,
    /// Fingerprint of the visible text (driver-chosen hash).
    pub text_fingerprint: String,
}

/// A clickable control found during a scan.
#[derive(Debug, Clone)]
pub struct PageControl {
    /// Selector the driver can address this control by.
    pub selector: String,
    /// Visible text, used for vocabulary scoring.
    pub text: String,
    /// Center coordinates for the coordinate-click fallback.
    pub center: Option<(f64, f64)>,
}

impl PageControl {
    /// Stable identity for per-control click accounting.
    fn key(&self) -> String {
        format!("{}|{}", self.selector, self.text.to_lowercase())
    }
}

/// Abstraction over a live, scriptable page.
///
/// The engine never touches a browser API directly; the production
/// implementation wraps a CDP page, tests use an in-memory mock.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Compute the current structural digest.
    async fn digest(&self) -> Result<PageDigest, Error>;

    /// Enumerate visible clickable controls (buttons, anchors, ARIA
    /// buttons).
    async fn controls(&self) -> Result<Vec<PageControl>, Error>;

    /// Click by selector. `Ok(false)` means the element could not be
    /// clicked (detached, covered, gone).
    async fn click_selector(&self, selector: &str) -> Result<bool, Error>;

    /// Click by viewport coordinates.
    async fn click_coordinates(&self, x: f64, y: f64) -> Result<bool, Error>;

    /// Last-resort scripted `el.click()` dispatch.
    async fn click_script(&self, selector: &str) -> Result<bool, Error>;

    /// Wait for in-flight mutations to settle.
    async fn settle(&self);

    /// Serialize the current DOM.
    async fn html(&self) -> Result<String, Error>;
}

/// Expansion bounds. Every loop in the engine is capped by one of these.
#[derive(Debug, Clone)]
pub struct ExpansionConfig {
    /// Hard ceiling on scan/click/verify rounds.
    pub max_rounds: u32,

    /// Consecutive rounds without digest change before convergence.
    pub max_stale_rounds: u32,

    /// Maximum clicks on any single control without a digest change.
    /// Budgets refund on a productive round, so a load-more button that
    /// keeps yielding content is never cut off by this cap.
    pub per_control_cap: u32,

    /// Maximum pagination steps followed.
    pub max_pages: u32,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self { max_rounds: 10, max_stale_rounds: 3, per_control_cap: 2, max_pages: 5 }
    }
}

/// What the engine did and why it stopped.
#[derive(Debug, Clone, Default)]
pub struct ExpansionReport {
    pub rounds: u32,
    pub clicks: u32,
    pub pages_followed: u32,
    /// True when the digest went stale; false when a cap ended the run.
    pub converged: bool,
}

/// Drives scan/click/verify rounds against a [`PageDriver`].
pub struct ExpansionEngine {
    dictionary: Arc<Dictionary>,
    config: ExpansionConfig,
}

impl ExpansionEngine {
    pub fn new(dictionary: Arc<Dictionary>, config: ExpansionConfig) -> Self {
        Self { dictionary, config }
    }

    /// Expand the page until convergence or a cap, returning the final
    /// HTML and a report.
    ///
    /// Cookie walls are dismissed before the first scan so consent
    /// overlays never absorb content clicks.
    ///
    /// # Errors
    ///
    /// Fails only when the driver can no longer produce a digest or
    /// serialize the DOM; individual click failures are absorbed.
    pub async fn expand(&self, driver: &dyn PageDriver) -> Result<(String, ExpansionReport), Error> {
        let mut report = ExpansionReport::default();
        let mut click_counts: HashMap<String, u32> = HashMap::new();

        self.dismiss_cookie_walls(driver).await;

        let mut last_digest = driver.digest().await?;
        let mut stale_rounds = 0u32;

        while report.rounds < self.config.max_rounds {
            report.rounds += 1;

            // Scan: collect expansion candidates for this round.
            let candidates = self.scan(driver, &click_counts).await?;
            if candidates.is_empty() && report.pages_followed >= self.config.max_pages {
                report.converged = true;
                break;
            }

            // Click: try each candidate with the fallback chain.
            let mut clicked_any = false;
            for control in &candidates {
                if self.click_with_fallbacks(driver, control).await {
                    *click_counts.entry(control.key()).or_insert(0) += 1;
                    report.clicks += 1;
                    clicked_any = true;
                }
            }

            // Pagination only once per round, after content clicks.
            if !clicked_any
                && report.pages_followed < self.config.max_pages
                && let Some(next) = self.find_pagination_control(driver, &click_counts).await?
                && self.click_with_fallbacks(driver, &next).await
            {
                *click_counts.entry(next.key()).or_insert(0) += 1;
                report.pages_followed += 1;
                report.clicks += 1;
                clicked_any = true;
            }

            if !clicked_any {
                report.converged = true;
                break;
            }

            driver.settle().await;

            // Verify: digest comparison is the only progress signal.
            let digest = driver.digest().await?;
            if digest == last_digest {
                stale_rounds += 1;
                if stale_rounds >= self.config.max_stale_rounds {
                    report.converged = true;
                    break;
                }
            } else {
                stale_rounds = 0;
                last_digest = digest;
                // Productive round: refund per-control budgets so the cap
                // only binds on clicks that yield nothing.
                click_counts.clear();
            }
        }

        tracing::debug!(
            rounds = report.rounds,
            clicks = report.clicks,
            pages = report.pages_followed,
            converged = report.converged,
            "expansion finished"
        );

        let html = driver.html().await?;
        Ok((html, report))
    }

    /// Click every cookie-dismissal selector once, ignoring failures.
    async fn dismiss_cookie_walls(&self, driver: &dyn PageDriver) {
        for selector in self.dictionary.cookie_selectors() {
            match driver.click_selector(selector).await {
                Ok(true) => {
                    tracing::debug!("dismissed consent control {selector}");
                    driver.settle().await;
                }
                Ok(false) => {}
                Err(e) => tracing::debug!("consent click {selector} failed: {e}"),
            }
        }
    }

    /// Collect controls worth clicking this round.
    ///
    /// A control qualifies when its selector matches the show-more list or
    /// its text scores positively against the expansion vocabulary; vetoed
    /// text (cookie/login/subscribe wording) always disqualifies, as does
    /// an exhausted per-control budget.
    async fn scan(
        &self, driver: &dyn PageDriver, click_counts: &HashMap<String, u32>,
    ) -> Result<Vec<PageControl>, Error> {
        let controls = driver.controls().await?;
        let mut candidates: Vec<(i32, PageControl)> = Vec::new();

        for control in controls {
            if click_counts.get(&control.key()).copied().unwrap_or(0) >= self.config.per_control_cap {
                continue;
            }
            if is_vetoed(&control.text, &self.dictionary) {
                continue;
            }

            let selector_hit = self
                .dictionary
                .show_more_selectors()
                .iter()
                .any(|s| control.selector == *s);
            let score = control_score(&control.text, &self.dictionary) + if selector_hit { 2 } else { 0 };

            if score > 0 {
                candidates.push((score, control));
            }
        }

        candidates.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(candidates.into_iter().map(|(_, c)| c).collect())
    }

    /// First pagination control with remaining click budget.
    async fn find_pagination_control(
        &self, driver: &dyn PageDriver, click_counts: &HashMap<String, u32>,
    ) -> Result<Option<PageControl>, Error> {
        let controls = driver.controls().await?;

        for selector in self.dictionary.pagination_selectors() {
            if let Some(control) = controls.iter().find(|c| &c.selector == selector)
                && click_counts.get(&control.key()).copied().unwrap_or(0) < self.config.per_control_cap
                && !is_vetoed(&control.text, &self.dictionary)
            {
                return Ok(Some(control.clone()));
            }
        }

        Ok(None)
    }

    /// Selector click, then coordinates, then scripted dispatch.
    async fn click_with_fallbacks(&self, driver: &dyn PageDriver, control: &PageControl) -> bool {
        match driver.click_selector(&control.selector).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => tracing::debug!("selector click {} failed: {e}", control.selector),
        }

        if let Some((x, y)) = control.center {
            match driver.click_coordinates(x, y).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => tracing::debug!("coordinate click at ({x}, {y}) failed: {e}"),
            }
        }

        match driver.click_script(&control.selector).await {
            Ok(clicked) => clicked,
            Err(e) => {
                tracing::debug!("scripted click {} failed: {e}", control.selector);
                false
            }
        }
    }
}

/// Vocabulary scoring helpers, split out so the engine body stays about
/// control flow.
mod dictionary_match {
    use joblens_core::Dictionary;

    /// Positive-term score for a control's text.
    pub(super) fn control_score(text: &str, dictionary: &Dictionary) -> i32 {
        let lower = text.to_lowercase();
        dictionary
            .expand_positive_terms()
            .iter()
            .filter(|t| lower.contains(&t.to_lowercase()))
            .count() as i32
    }

    /// A single negative term vetoes the control outright.
    pub(super) fn is_vetoed(text: &str, dictionary: &Dictionary) -> bool {
        let lower = text.to_lowercase();
        dictionary
            .expand_negative_terms()
            .iter()
            .any(|t| lower.contains(&t.to_lowercase()))
    }
}
