//! Core types and shared functionality for joblens.
//!
//! This crate provides:
//! - The extraction data model (results, links, options, context)
//! - The injected dictionary (vocabulary, selectors, platform signatures)
//! - SQLite-backed result cache and the `ResultCache` trait
//! - The debug-capture collaborator interface
//! - Unified error types and layered configuration

pub mod cache;
pub mod config;
pub mod debug;
pub mod dictionary;
pub mod error;
pub mod model;

pub use cache::{CacheDb, MemoryCache, ResultCache, compute_cache_key};
pub use config::AppConfig;
pub use debug::{DebugArtifacts, DebugCapturer, NoopCapturer, SamplingPolicy};
pub use dictionary::{Dictionary, PlatformSignature};
pub use error::Error;
pub use model::{
    BatchOutcome, ExtractionResult, JobLink, LinkType, MatchType, PipelineContext, ScrapeFailure, ScrapeOptions,
};
