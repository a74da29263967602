//! Fan-out / fan-in over the registered sources
//!
//! For every company token in a query, each source of the target region is asked to
//! `search_company` and then `get_documents`, all sources running concurrently as separate
//! tasks. A source that errors, times out, panics or finds no acceptable match contributes
//! nothing and leaves a [`SourceDiagnostic`] behind; its siblings are unaffected. The merged
//! candidates go through [`deduplicate`] before being returned.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::config::AggregatorConfig;
use crate::dedup::deduplicate;
use crate::error::{Error, Result};
use crate::matching::{CompanyMatcher, normalize_company_name, split_query};
use crate::source::{DocumentSource, SourceRegistry, registry};
use crate::types::{
    Aggregation, CompanyMatch, DiagnosticKind, DocType, DocumentRecord, RankedMatch, Region,
    RegionInfo, SourceDiagnostic,
};

/// Discovery front door: query in, deduplicated document list out
#[derive(Clone, Debug)]
pub struct Aggregator {
    registry: Arc<SourceRegistry>,
    matcher: CompanyMatcher,
    config: AggregatorConfig,
}

/// Inputs of one source query, owned so the query can run as its own task
struct SourceQuery {
    source: Arc<dyn DocumentSource>,
    token: String,
    count: usize,
    doc_types: HashSet<DocType>,
    matcher: CompanyMatcher,
    timeout: Duration,
}

impl Aggregator {
    /// Aggregator over `registry`
    pub fn new(registry: Arc<SourceRegistry>, config: AggregatorConfig) -> Self {
        let matcher = CompanyMatcher::new(config.match_threshold);
        Self {
            registry,
            matcher,
            config,
        }
    }

    /// Aggregator over the process-wide registry
    ///
    /// Fails with [`Error::Config`] when [`registry::install_global`] has not been called.
    pub fn from_global(config: AggregatorConfig) -> Result<Self> {
        let registry = registry::global().ok_or_else(|| {
            Error::config(
                "registry",
                "no global source registry installed; call install_global first",
            )
        })?;
        Ok(Self::new(registry, config))
    }

    /// Registry in use
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Matcher in use
    pub fn matcher(&self) -> &CompanyMatcher {
        &self.matcher
    }

    /// Discover documents for every company in `query`
    ///
    /// `query` may name several companies separated by the configured delimiter; their
    /// documents appear in query order. `count` limits each source to its most recent fiscal
    /// periods. Only `doc_types` are kept. Never fails: a query nobody can answer yields an
    /// empty [`Aggregation`] whose diagnostics explain why.
    pub async fn aggregate(
        &self,
        query: &str,
        region: Region,
        count: usize,
        doc_types: &HashSet<DocType>,
    ) -> Aggregation {
        let tokens = split_query(query, self.config.query_delimiter);
        if tokens.is_empty() || count == 0 || doc_types.is_empty() {
            tracing::debug!(query, count, "Nothing to aggregate");
            return Aggregation::default();
        }

        let per_company = join_all(
            tokens
                .iter()
                .map(|token| self.collect_company(token, region, count, doc_types)),
        )
        .await;

        let mut candidates = Vec::new();
        let mut diagnostics = Vec::new();
        for (records, diags) in per_company {
            candidates.extend(records);
            diagnostics.extend(diags);
        }

        let raw = candidates.len();
        let documents = deduplicate(candidates);

        tracing::info!(
            query,
            region = %region,
            companies = tokens.len(),
            candidates = raw,
            documents = documents.len(),
            diagnostics = diagnostics.len(),
            "Aggregation complete"
        );

        Aggregation {
            documents,
            diagnostics,
        }
    }

    /// Companies matching `query` across one region (or every region), best first
    ///
    /// Sources are queried concurrently; failing sources are logged and skipped.
    pub async fn search_companies(&self, query: &str, region: Option<Region>) -> Vec<RankedMatch> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let sources: Vec<Arc<dyn DocumentSource>> = match region {
            Some(region) => self.registry.sources_for(region).to_vec(),
            None => self.registry.all_sources().cloned().collect(),
        };

        let search_query = normalize_company_name(query);
        let handles = sources.into_iter().map(|source| {
            let timeout = self.config.source_timeout;
            let search_query = search_query.clone();
            let name = source.source_name().to_string();
            let source_region = source.region();
            let handle = tokio::spawn(async move {
                tokio::time::timeout(timeout, source.search_company(&search_query)).await
            });
            async move { (name, source_region, handle.await) }
        });

        let mut ranked = Vec::new();
        for (source_name, source_region, joined) in join_all(handles).await {
            let candidates = match joined {
                Ok(Ok(Ok(candidates))) => candidates,
                Ok(Ok(Err(e))) => {
                    tracing::warn!(source = %source_name, error = %e, "Company search failed");
                    continue;
                }
                Ok(Err(_)) => {
                    tracing::warn!(source = %source_name, "Company search timed out");
                    continue;
                }
                Err(e) => {
                    tracing::error!(
                        source = %source_name,
                        error = %e,
                        "Company search task failed"
                    );
                    continue;
                }
            };
            ranked.extend(self.matcher.rank(query, candidates).into_iter().map(
                |(company, score)| RankedMatch {
                    company,
                    source_name: source_name.clone(),
                    region: source_region,
                    score,
                },
            ));
        }

        // Stable: equal scores keep region then priority order
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }

    /// Every region with at least one source
    pub fn available_regions(&self) -> Vec<RegionInfo> {
        self.registry
            .regions()
            .into_iter()
            .filter_map(|region| {
                let sources = self.registry.sources_for(region);
                let lead = sources.first()?;
                Some(RegionInfo {
                    region,
                    display_name: region.display_name().to_string(),
                    fiscal_year: lead.fiscal_year_convention(),
                    sources: sources.iter().map(|s| s.source_name().to_string()).collect(),
                })
            })
            .collect()
    }

    /// Records for one company token, falling back to other regions when the target has none
    async fn collect_company(
        &self,
        token: &str,
        region: Region,
        count: usize,
        doc_types: &HashSet<DocType>,
    ) -> (Vec<DocumentRecord>, Vec<SourceDiagnostic>) {
        let (records, mut diagnostics) = self.collect_region(token, region, count, doc_types).await;
        if !records.is_empty() {
            return (records, diagnostics);
        }

        for &fallback in self.config.fallback_regions.iter().filter(|r| **r != region) {
            tracing::debug!(
                company = token,
                from = %region,
                to = %fallback,
                "Trying fallback region"
            );
            let (records, diags) = self.collect_region(token, fallback, count, doc_types).await;
            diagnostics.extend(diags);
            if !records.is_empty() {
                return (records, diagnostics);
            }
        }
        (Vec::new(), diagnostics)
    }

    /// Query every source of `region` concurrently; records come back in registry order
    async fn collect_region(
        &self,
        token: &str,
        region: Region,
        count: usize,
        doc_types: &HashSet<DocType>,
    ) -> (Vec<DocumentRecord>, Vec<SourceDiagnostic>) {
        let sources = self.registry.sources_for(region);
        if sources.is_empty() {
            tracing::debug!(region = %region, "No sources registered for region");
            return (Vec::new(), Vec::new());
        }

        let handles = sources.iter().map(|source| {
            let name = source.source_name().to_string();
            let handle = tokio::spawn(query_source(SourceQuery {
                source: Arc::clone(source),
                token: token.to_string(),
                count,
                doc_types: doc_types.clone(),
                matcher: self.matcher,
                timeout: self.config.source_timeout,
            }));
            async move { (name, handle.await) }
        });

        let mut records = Vec::new();
        let mut diagnostics = Vec::new();
        for (source_name, joined) in join_all(handles).await {
            let outcome = joined.unwrap_or_else(|e| {
                Err((
                    DiagnosticKind::SourceUnavailable,
                    format!("source task failed: {e}"),
                ))
            });
            match outcome {
                Ok(found) => records.extend(found),
                Err((kind, message)) => {
                    match kind {
                        DiagnosticKind::NoMatch => {
                            tracing::debug!(source = %source_name, company = token, "{message}")
                        }
                        _ => tracing::warn!(
                            source = %source_name,
                            company = token,
                            region = %region,
                            error = %message,
                            "Source contributed no records"
                        ),
                    }
                    diagnostics.push(SourceDiagnostic {
                        source_name,
                        region,
                        query: token.to_string(),
                        kind,
                        message,
                    });
                }
            }
        }
        (records, diagnostics)
    }
}

/// Search, match and list documents on one source, each step under the source timeout
async fn query_source(
    q: SourceQuery,
) -> std::result::Result<Vec<DocumentRecord>, (DiagnosticKind, String)> {
    let name = q.source.source_name().to_string();
    let search_query = normalize_company_name(&q.token);

    let candidates: Vec<CompanyMatch> =
        match tokio::time::timeout(q.timeout, q.source.search_company(&search_query)).await {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(e)) => return Err(unavailable(&name, e)),
            Err(_) => return Err(timed_out(&name, "search_company", q.timeout)),
        };

    let Some((company, score)) = q.matcher.best_match(&q.token, &candidates) else {
        return Err((
            DiagnosticKind::NoMatch,
            format!(
                "none of {} candidates scored at least {}",
                candidates.len(),
                q.matcher.threshold()
            ),
        ));
    };
    tracing::debug!(
        source = %name,
        company = q.token,
        matched = %company.identity.name,
        score,
        "Matched company"
    );

    let documents = match tokio::time::timeout(
        q.timeout,
        q.source.get_documents(company, q.count, &q.doc_types),
    )
    .await
    {
        Ok(Ok(documents)) => documents,
        Ok(Err(e)) => return Err(unavailable(&name, e)),
        Err(_) => return Err(timed_out(&name, "get_documents", q.timeout)),
    };

    Ok(documents
        .into_iter()
        .filter(|d| q.doc_types.contains(&d.doc_type))
        .collect())
}

fn unavailable(source_name: &str, error: Error) -> (DiagnosticKind, String) {
    let error = match error {
        e @ Error::SourceUnavailable { .. } => e,
        other => Error::SourceUnavailable {
            source_name: source_name.to_string(),
            reason: other.to_string(),
        },
    };
    (DiagnosticKind::SourceUnavailable, error.to_string())
}

fn timed_out(
    source_name: &str,
    operation: &'static str,
    timeout: Duration,
) -> (DiagnosticKind, String) {
    let error = Error::SourceTimeout {
        source_name: source_name.to_string(),
        operation,
        timeout,
    };
    (DiagnosticKind::Timeout, error.to_string())
}
