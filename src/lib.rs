//! # earnings-dl
//!
//! Backend library that finds, deduplicates and downloads earnings documents (call
//! transcripts, investor presentations, press releases) from several providers per region.
//!
//! ## Design Philosophy
//!
//! earnings-dl is designed to be:
//! - **Pluggable** - Providers implement [`DocumentSource`]; the pipeline never scrapes pages
//! - **Failure-tolerant** - One broken provider or one dead link never aborts the rest
//! - **Deterministic** - Duplicate documents always resolve to the same, most authoritative copy
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::collections::HashSet;
//! use std::sync::Arc;
//! use earnings_dl::{Aggregator, Config, DocType, FetchManager, Region, SourceRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     // Register provider implementations once at startup
//!     let registry = SourceRegistry::builder()
//!         // .register(Arc::new(MyExchangeSource::new()))?
//!         .build();
//!
//!     let aggregator = Aggregator::new(Arc::new(registry), config.aggregator.clone());
//!     let doc_types: HashSet<DocType> = DocType::ALL.into_iter().collect();
//!     let found = aggregator
//!         .aggregate("Acme Industries, Globex", Region::India, 4, &doc_types)
//!         .await;
//!
//!     let fetcher = FetchManager::new(config.fetch.clone())?;
//!     let results = fetcher
//!         .fetch_all(found.documents, fetcher.default_options())
//!         .await;
//!     for result in &results {
//!         println!("{} -> {:?}", result.record.file_stem(), result.status);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Query fan-out across sources
pub mod aggregator;
/// Configuration types
pub mod config;
/// Duplicate document removal
pub mod dedup;
/// Error types
pub mod error;
/// Document retrieval worker pool
pub mod fetch;
/// Company name normalisation and fuzzy matching
pub mod matching;
/// Retry logic with exponential backoff
pub mod retry;
/// Document source contract and registry
pub mod source;
/// Core types
pub mod types;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use aggregator::Aggregator;
pub use config::{AggregatorConfig, Config, FetchConfig, PayloadCheck, RetryConfig};
pub use dedup::deduplicate;
pub use error::{Error, FetchError, Result};
pub use fetch::{
    DocumentTransport, FetchManager, FetchOptions, FetchProgress, HttpTransport, Payload,
};
pub use matching::CompanyMatcher;
pub use source::registry::{global as global_registry, install_global};
pub use source::{DocumentSource, SourceRegistry, SourceRegistryBuilder};
pub use types::{
    Aggregation, CompanyIdentity, CompanyMatch, DiagnosticKind, DocType, DocumentRecord,
    FetchResult, FetchStatus, FetchSummary, FiscalPeriod, FiscalYearConvention, RankedMatch,
    Region, RegionInfo, SourceDiagnostic,
};
