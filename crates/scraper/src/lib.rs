//! Scraping engine for joblens.
//!
//! This crate provides the fetch pipeline, platform detection, extraction
//! steps, content expansion, and the orchestrator that ties them into a
//! cache-first job-posting pipeline.

pub mod detect;
pub mod expand;
pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod steps;
pub mod validate;

#[cfg(feature = "render")]
pub mod render;

pub use detect::PlatformDetector;
pub use expand::{ExpansionConfig, ExpansionEngine, ExpansionReport, PageControl, PageDigest, PageDriver};
pub use fetch::{FetchClient, FetchConfig, FetchResponse};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use steps::{ExtractionStep, IframeStep, PlatformStep, StaticHtmlStep, StepRegistry};
pub use validate::{RejectReason, ValidationConfig, Validator, score_links};

#[cfg(feature = "render")]
pub use render::{BrowserHandle, CdpPageDriver, RenderOptions, RenderedPage};

#[cfg(feature = "render")]
pub use steps::HeadlessStep;
