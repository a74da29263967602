//! Document source abstraction
//!
//! A source is one provider of earnings documents for one region (an exchange filing site, a
//! data aggregator, a company's investor-relations page). Scraping and API details live in the
//! implementations; the pipeline only sees the [`DocumentSource`] contract and the
//! [`DocumentRecord`]s it produces.

pub mod registry;

pub use registry::{SourceRegistry, SourceRegistryBuilder};

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};

use crate::error::Result;
use crate::types::{
    CompanyIdentity, CompanyMatch, DocType, DocumentRecord, FiscalPeriod, FiscalYearConvention,
    Region,
};

/// Contract every document provider implements
///
/// Static metadata is read once at registration; the two async operations are called by the
/// aggregator under a per-call timeout.
///
/// # Implementation Notes
///
/// - Return an empty `Vec` for "nothing found"; reserve `Err` for transport failures.
/// - Build records with [`DocumentSource::record`] so name, region and priority are stamped
///   from this source's metadata.
///
/// # Example
///
/// ```no_run
/// use async_trait::async_trait;
/// use std::collections::HashSet;
/// use earnings_dl::source::DocumentSource;
/// use earnings_dl::types::{
///     CompanyIdentity, CompanyMatch, DocType, DocumentRecord, FiscalYearConvention, Region,
/// };
///
/// struct CompanyIr;
///
/// #[async_trait]
/// impl DocumentSource for CompanyIr {
///     fn source_name(&self) -> &str { "company_ir" }
///     fn region(&self) -> Region { Region::India }
///     fn fiscal_year_convention(&self) -> FiscalYearConvention {
///         FiscalYearConvention::AprilToMarch
///     }
///     fn priority(&self) -> u32 { 0 }
///
///     async fn search_company(&self, query: &str) -> earnings_dl::Result<Vec<CompanyMatch>> {
///         Ok(vec![CompanyMatch::new(CompanyIdentity::new(query))])
///     }
///
///     async fn get_documents(
///         &self,
///         company: &CompanyMatch,
///         _count: usize,
///         _doc_types: &HashSet<DocType>,
///     ) -> earnings_dl::Result<Vec<DocumentRecord>> {
///         let url = "https://ir.example.com/q3fy26.pdf".to_string();
///         Ok(vec![
///             self.record(company.identity.clone(), DocType::Transcript, url)
///                 .with_label("Q3FY26"),
///         ])
///     }
/// }
/// ```
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Unique identifier (e.g. "bse", "screener", "edgar")
    fn source_name(&self) -> &str;

    /// Region this source serves
    fn region(&self) -> Region;

    /// How this source numbers fiscal years
    fn fiscal_year_convention(&self) -> FiscalYearConvention;

    /// Authority ranking; lower wins deduplication ties
    fn priority(&self) -> u32;

    /// Find companies matching `query`
    ///
    /// May return zero or many candidates; the aggregator decides which one (if any) is the
    /// requested company.
    async fn search_company(&self, query: &str) -> Result<Vec<CompanyMatch>>;

    /// List documents for a company, covering at most `count` recent fiscal periods
    async fn get_documents(
        &self,
        company: &CompanyMatch,
        count: usize,
        doc_types: &HashSet<DocType>,
    ) -> Result<Vec<DocumentRecord>>;

    /// New record stamped with this source's region, name and priority
    fn record(&self, company: CompanyIdentity, doc_type: DocType, url: String) -> DocumentRecord {
        DocumentRecord::new(
            company,
            self.region(),
            doc_type,
            url,
            self.source_name(),
            self.priority(),
        )
    }
}

/// Keep every record belonging to the `count` most recent fiscal periods, newest first
///
/// Records without a period form one bucket that sorts after all dated ones. Within a bucket
/// the input order is kept. Intended for source implementations honouring the `count`
/// argument of [`DocumentSource::get_documents`].
pub fn limit_to_recent_periods(records: Vec<DocumentRecord>, count: usize) -> Vec<DocumentRecord> {
    // Option<FiscalPeriod> orders None first, so reversing puts it last
    let mut buckets: BTreeMap<std::cmp::Reverse<Option<FiscalPeriod>>, Vec<DocumentRecord>> =
        BTreeMap::new();
    for record in records {
        buckets
            .entry(std::cmp::Reverse(record.fiscal_period))
            .or_default()
            .push(record);
    }
    buckets.into_values().take(count).flatten().collect()
}
