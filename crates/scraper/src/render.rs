//! Headless rendering for JS-heavy career pages.
//!
//! Compiled only with the `render` feature. One Chromium instance is
//! shared behind an async mutex and launched lazily on first use; every
//! render attempt gets its own page, closed on all exit paths.
//!
//! [`CdpPageDriver`] adapts a live CDP page to the expansion engine's
//! [`PageDriver`] seam, so page digests and clicks go through evaluated
//! JavaScript rather than bespoke browser calls scattered through steps.

use crate::expand::{ExpansionEngine, ExpansionReport, PageControl, PageDigest, PageDriver};
use joblens_core::Error;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::layout::Point;
use chromiumoxide::page::Page;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// Options for one render attempt.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Ceiling for navigation plus waiting, in milliseconds.
    pub timeout_ms: u64,

    /// Optional CSS selector to wait for before reading content.
    pub wait_for: Option<String>,

    /// Quiet period after navigation or a click, in milliseconds.
    pub settle_ms: u64,

    /// Selectors that count as job candidates in page digests.
    pub job_selectors: Vec<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            wait_for: None,
            settle_ms: 1_200,
            job_selectors: vec!["a[href*=\"job\"]".to_string(), "a[href*=\"career\"]".to_string()],
        }
    }
}

/// Outcome of a successful render.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Serialized DOM after waiting (and expansion, if requested).
    pub html: String,

    /// Final URL after redirects.
    pub final_url: Url,

    /// Wall time spent rendering, in milliseconds.
    pub render_time_ms: u64,

    /// Expansion report when the engine ran.
    pub expansion: Option<ExpansionReport>,
}

/// Lazily-launched shared browser.
///
/// `shutdown` is idempotent; a handle whose browser died relaunches on
/// the next render.
pub struct BrowserHandle {
    browser: Mutex<Option<Browser>>,
}

impl BrowserHandle {
    pub fn new() -> Self {
        Self { browser: Mutex::new(None) }
    }

    /// Render a URL without content expansion.
    ///
    /// # Errors
    ///
    /// Fails on browser launch, navigation, or content retrieval errors,
    /// and on `wait_for` timeout.
    pub async fn render(&self, url: &Url, opts: &RenderOptions) -> Result<RenderedPage, Error> {
        self.with_page(url, opts, None).await
    }

    /// Render a URL and run the expansion engine on the live page before
    /// serializing.
    pub async fn render_expanded(
        &self, url: &Url, opts: &RenderOptions, engine: &ExpansionEngine,
    ) -> Result<RenderedPage, Error> {
        self.with_page(url, opts, Some(engine)).await
    }

    /// Close the shared browser. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            browser.close().await.ok();
            browser.wait().await.ok();
            tracing::debug!("browser shut down");
        }
    }

    async fn with_page(
        &self, url: &Url, opts: &RenderOptions, engine: Option<&ExpansionEngine>,
    ) -> Result<RenderedPage, Error> {
        let mut guard = self.browser.lock().await;
        if guard.is_none() {
            *guard = Some(launch_browser().await?);
        }
        let browser = guard
            .as_ref()
            .ok_or_else(|| Error::RenderFailed("browser unavailable".to_string()))?;

        let start = std::time::Instant::now();
        let page = browser
            .new_page(url.as_str())
            .await
            .map_err(|e| Error::RenderFailed(format!("navigation failed: {e}")))?;

        // Page must be closed on every exit path.
        let outcome = render_on_page(&page, url, opts, engine).await;
        page.close().await.ok();

        let (html, final_url, expansion) = outcome?;
        Ok(RenderedPage { html, final_url, render_time_ms: start.elapsed().as_millis() as u64, expansion })
    }
}

impl Default for BrowserHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Launch a headless browser and spawn its CDP event loop.
async fn launch_browser() -> Result<Browser, Error> {
    use futures_util::StreamExt;

    let config = BrowserConfig::builder()
        .window_size(1280, 720)
        .build()
        .map_err(Error::RenderFailed)?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| Error::RenderFailed(format!("browser launch failed: {e}")))?;

    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::debug!("browser handler event error: {e}");
                break;
            }
        }
    });

    Ok(browser)
}

async fn render_on_page(
    page: &Page, url: &Url, opts: &RenderOptions, engine: Option<&ExpansionEngine>,
) -> Result<(String, Url, Option<ExpansionReport>), Error> {
    wait_for_content(page, opts).await?;

    let (html, report) = match engine {
        Some(engine) => {
            let driver = CdpPageDriver::new(page.clone(), opts.job_selectors.clone(), opts.settle_ms);
            let (html, report) = engine.expand(&driver).await?;
            (html, Some(report))
        }
        None => {
            let html = page
                .content()
                .await
                .map_err(|e| Error::RenderFailed(format!("content retrieval failed: {e}")))?;
            (html, None)
        }
    };

    let final_url = page
        .url()
        .await
        .map_err(|e| Error::RenderFailed(format!("content retrieval failed: {e}")))?
        .and_then(|u| Url::parse(&u).ok())
        .unwrap_or_else(|| url.clone());

    Ok((html, final_url, report))
}

/// Wait for the `wait_for` selector by polling, or fall back to a fixed
/// settle period.
async fn wait_for_content(page: &Page, opts: &RenderOptions) -> Result<(), Error> {
    match &opts.wait_for {
        Some(selector) => {
            let waited = tokio::time::timeout(Duration::from_millis(opts.timeout_ms), async {
                loop {
                    if (page.find_element(selector.as_str()).await).is_ok() {
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            })
            .await;

            waited.map_err(|_| Error::RenderFailed(format!("wait_for selector not found: {selector}")))
        }
        None => {
            tokio::time::sleep(Duration::from_millis(opts.settle_ms)).await;
            Ok(())
        }
    }
}

/// Expansion-engine driver backed by a live CDP page.
///
/// Control enumeration tags each visible clickable element with a
/// `data-jl-id` attribute so later clicks can address exactly the element
/// that was scanned, regardless of how ugly its natural selector is.
pub struct CdpPageDriver {
    page: Page,
    job_selectors: Vec<String>,
    settle_ms: u64,
}

impl CdpPageDriver {
    pub fn new(page: Page, job_selectors: Vec<String>, settle_ms: u64) -> Self {
        Self { page, job_selectors, settle_ms }
    }
}

#[derive(Deserialize)]
struct JsDigest {
    elements: u64,
    height: u64,
    jobs: u64,
    fingerprint: String,
}

#[derive(Deserialize)]
struct JsControl {
    selector: String,
    text: String,
    x: f64,
    y: f64,
}

#[async_trait]
impl PageDriver for CdpPageDriver {
    async fn digest(&self) -> Result<PageDigest, Error> {
        let job_selector = self.job_selectors.join(", ");
        let script = format!(
            r#"(() => {{
                const elements = document.getElementsByTagName('*').length;
                const body = document.body;
                const height = body ? body.scrollHeight : 0;
                let jobs = 0;
                try {{ jobs = document.querySelectorAll({job_selector:?}).length; }} catch (e) {{}}
                const text = body ? body.innerText : '';
                let h = 0;
                for (let i = 0; i < text.length; i++) {{ h = (h * 31 + text.charCodeAt(i)) >>> 0; }}
                return {{ elements, height, jobs, fingerprint: h + ':' + text.length }};
            }})()"#
        );

        let digest: JsDigest = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| Error::RenderFailed(format!("digest evaluation failed: {e}")))?
            .into_value()
            .map_err(|e| Error::RenderFailed(format!("digest deserialization failed: {e}")))?;

        Ok(PageDigest {
            element_count: digest.elements,
            scroll_height: digest.height,
            job_matches: digest.jobs,
            text_fingerprint: digest.fingerprint,
        })
    }

    async fn controls(&self) -> Result<Vec<PageControl>, Error> {
        let script = r#"(() => {
            const out = [];
            const els = document.querySelectorAll(
                'button, a, [role="button"], input[type="button"], input[type="submit"]');
            let i = 0;
            for (const el of els) {
                const r = el.getBoundingClientRect();
                if (r.width === 0 || r.height === 0) continue;
                const id = 'jl-' + (i++);
                el.setAttribute('data-jl-id', id);
                const text = (el.innerText || el.value || '').trim().slice(0, 120);
                out.push({
                    selector: '[data-jl-id="' + id + '"]',
                    text,
                    x: r.x + r.width / 2,
                    y: r.y + r.height / 2,
                });
            }
            return out;
        })()"#;

        let controls: Vec<JsControl> = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| Error::RenderFailed(format!("control scan failed: {e}")))?
            .into_value()
            .map_err(|e| Error::RenderFailed(format!("control deserialization failed: {e}")))?;

        Ok(controls
            .into_iter()
            .map(|c| PageControl { selector: c.selector, text: c.text, center: Some((c.x, c.y)) })
            .collect())
    }

    async fn click_selector(&self, selector: &str) -> Result<bool, Error> {
        match self.page.find_element(selector).await {
            Ok(element) => Ok(element.click().await.is_ok()),
            Err(_) => Ok(false),
        }
    }

    async fn click_coordinates(&self, x: f64, y: f64) -> Result<bool, Error> {
        Ok(self.page.click(Point::new(x, y)).await.is_ok())
    }

    async fn click_script(&self, selector: &str) -> Result<bool, Error> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({selector:?});
                if (!el) return false;
                el.click();
                return true;
            }})()"#
        );

        let clicked: bool = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| Error::RenderFailed(format!("scripted click failed: {e}")))?
            .into_value()
            .unwrap_or(false);

        Ok(clicked)
    }

    async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(self.settle_ms)).await;
    }

    async fn html(&self) -> Result<String, Error> {
        self.page
            .content()
            .await
            .map_err(|e| Error::RenderFailed(format!("content retrieval failed: {e}")))
    }
}
