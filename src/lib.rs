//! Structured event extraction and pagination for venue and ticketing pages.
//!
//! One crawl invocation fetches a source, recognises embedded event data, and
//! returns at most one new event (or a provisional markup section) per call.

pub mod common;
pub mod config;
pub mod crawl;
pub mod extractors;
pub mod logging;
pub mod observability;
pub mod pagination;
pub mod pipeline;
pub mod section;

// Layered boundaries: ports owned by the application, adapters in infra
pub mod app;
pub mod infra;

pub use common::error::{Result, ScraperError};
pub use common::types::{EventPackage, FlowContext, NormalizedEvent, SectionPackage};
pub use crawl::{CrawlOrchestrator, CrawlOutcome, ExhaustReason, SourceFlow};
