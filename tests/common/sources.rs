//! In-memory document source backed by fixed company and document lists

use std::collections::HashSet;

use async_trait::async_trait;
use earnings_dl::source::limit_to_recent_periods;
use earnings_dl::{
    CompanyIdentity, CompanyMatch, DocType, DocumentRecord, DocumentSource, FiscalPeriod,
    FiscalYearConvention, Region,
};

/// Source answering from memory, as a scraper would after parsing its pages
pub struct StaticSource {
    name: String,
    region: Region,
    priority: u32,
    companies: Vec<CompanyIdentity>,
    documents: Vec<(String, DocType, String, Option<FiscalPeriod>)>,
}

impl StaticSource {
    pub fn new(name: &str, region: Region, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            region,
            priority,
            companies: Vec::new(),
            documents: Vec::new(),
        }
    }

    /// Add a document, registering its company on first use
    pub fn document(mut self, company: &str, doc_type: DocType, url: &str, label: &str) -> Self {
        if !self.companies.iter().any(|c| c.name == company) {
            self.companies.push(CompanyIdentity::new(company));
        }
        self.documents.push((
            company.to_string(),
            doc_type,
            url.to_string(),
            FiscalPeriod::parse_label(label),
        ));
        self
    }
}

#[async_trait]
impl DocumentSource for StaticSource {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn region(&self) -> Region {
        self.region
    }

    fn fiscal_year_convention(&self) -> FiscalYearConvention {
        FiscalYearConvention::AprilToMarch
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn search_company(&self, _query: &str) -> earnings_dl::Result<Vec<CompanyMatch>> {
        Ok(self.companies.iter().cloned().map(CompanyMatch::new).collect())
    }

    async fn get_documents(
        &self,
        company: &CompanyMatch,
        count: usize,
        doc_types: &HashSet<DocType>,
    ) -> earnings_dl::Result<Vec<DocumentRecord>> {
        let records = self
            .documents
            .iter()
            .filter(|(name, doc_type, _, _)| {
                *name == company.identity.name && doc_types.contains(doc_type)
            })
            .map(|(_, doc_type, url, period)| {
                let record = self.record(company.identity.clone(), *doc_type, url.clone());
                match period {
                    Some(p) => record.with_period(*p),
                    None => record,
                }
            })
            .collect();
        Ok(limit_to_recent_periods(records, count))
    }
}
