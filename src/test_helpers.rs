//! Shared test helpers: scripted sources and transports.

use crate::error::{Error, FetchError, Result};
use crate::fetch::{DocumentTransport, Payload};
use crate::source::{DocumentSource, limit_to_recent_periods};
use crate::types::{
    CompanyIdentity, CompanyMatch, DocType, DocumentRecord, FiscalPeriod, FiscalYearConvention,
    Region,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a [`FakeSource`] misbehaves
#[derive(Clone, Copy, Debug, Default)]
pub(crate) enum Behavior {
    #[default]
    Normal,
    FailSearch,
    FailDocuments,
    HangSearch(Duration),
    HangDocuments(Duration),
}

/// In-memory source: returns its whole company list from every search and the documents
/// registered for the matched company name.
pub(crate) struct FakeSource {
    name: String,
    region: Region,
    priority: u32,
    convention: FiscalYearConvention,
    companies: Vec<CompanyMatch>,
    documents: HashMap<String, Vec<DocumentRecord>>,
    behavior: Behavior,
    pub(crate) search_calls: AtomicU32,
    pub(crate) document_calls: AtomicU32,
    pub(crate) queries: Mutex<Vec<String>>,
}

impl FakeSource {
    pub(crate) fn new(name: &str, region: Region, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            region,
            priority,
            convention: FiscalYearConvention::Calendar,
            companies: Vec::new(),
            documents: HashMap::new(),
            behavior: Behavior::Normal,
            search_calls: AtomicU32::new(0),
            document_calls: AtomicU32::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_convention(mut self, convention: FiscalYearConvention) -> Self {
        self.convention = convention;
        self
    }

    pub(crate) fn with_company(mut self, identity: CompanyIdentity) -> Self {
        self.documents.entry(identity.name.clone()).or_default();
        self.companies.push(CompanyMatch::new(identity));
        self
    }

    /// Register a document for `company` (added as a company if unknown)
    pub(crate) fn with_document(
        mut self,
        company: &str,
        doc_type: DocType,
        url: &str,
        period: Option<(i32, u8)>,
    ) -> Self {
        if !self.companies.iter().any(|c| c.identity.name == company) {
            self = self.with_company(CompanyIdentity::new(company));
        }
        let mut record = self.record(CompanyIdentity::new(company), doc_type, url.to_string());
        if let Some(period) = period.and_then(|(y, q)| FiscalPeriod::new(y, q)) {
            record = record.with_period(period);
        }
        self.documents.entry(company.to_string()).or_default().push(record);
        self
    }

    pub(crate) fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub(crate) fn shared(self) -> Arc<dyn DocumentSource> {
        Arc::new(self)
    }

    pub(crate) fn searches(&self) -> u32 {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn listings(&self) -> u32 {
        self.document_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DocumentSource for FakeSource {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn region(&self) -> Region {
        self.region
    }

    fn fiscal_year_convention(&self) -> FiscalYearConvention {
        self.convention
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn search_company(&self, query: &str) -> Result<Vec<CompanyMatch>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());
        match self.behavior {
            Behavior::FailSearch => Err(Error::SourceUnavailable {
                source_name: self.name.clone(),
                reason: "search page returned 503".to_string(),
            }),
            Behavior::HangSearch(d) => {
                tokio::time::sleep(d).await;
                Ok(self.companies.clone())
            }
            _ => Ok(self.companies.clone()),
        }
    }

    async fn get_documents(
        &self,
        company: &CompanyMatch,
        count: usize,
        doc_types: &HashSet<DocType>,
    ) -> Result<Vec<DocumentRecord>> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::FailDocuments => {
                return Err(Error::Other("document listing failed".to_string()));
            }
            Behavior::HangDocuments(d) => tokio::time::sleep(d).await,
            _ => {}
        }
        let docs = self
            .documents
            .get(&company.identity.name)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|d| doc_types.contains(&d.doc_type))
            .collect();
        Ok(limit_to_recent_periods(docs, count))
    }
}

pub(crate) fn pdf(bytes: &[u8]) -> Payload {
    Payload::new(bytes.to_vec(), "application/pdf")
}

/// Decrements the in-flight counter even when the request future is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scripted transport
///
/// Each URL answers from its script queue first, then its sticky response, then a small PDF.
#[derive(Default)]
pub(crate) struct FakeTransport {
    scripts: Mutex<HashMap<String, VecDeque<std::result::Result<Payload, FetchError>>>>,
    sticky: Mutex<HashMap<String, std::result::Result<Payload, FetchError>>>,
    delays: Mutex<HashMap<String, Duration>>,
    default_delay: Mutex<Duration>,
    panics: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Answer the next requests for `url` with `responses`, in order
    pub(crate) fn script(
        self,
        url: &str,
        responses: Vec<std::result::Result<Payload, FetchError>>,
    ) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), responses.into());
        self
    }

    /// Answer every unscripted request for `url` with `response`
    pub(crate) fn always(
        self,
        url: &str,
        response: std::result::Result<Payload, FetchError>,
    ) -> Self {
        self.sticky.lock().unwrap().insert(url.to_string(), response);
        self
    }

    pub(crate) fn delay(self, url: &str, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
        self
    }

    pub(crate) fn default_delay(self, delay: Duration) -> Self {
        *self.default_delay.lock().unwrap() = delay;
        self
    }

    /// Panic inside `get` for `url`
    pub(crate) fn panic_on(self, url: &str) -> Self {
        self.panics.lock().unwrap().insert(url.to_string());
        self
    }

    pub(crate) fn calls(&self, url: &str) -> u32 {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DocumentTransport for FakeTransport {
    async fn get(&self, url: &str) -> std::result::Result<Payload, FetchError> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let delay = self
            .delays
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(*self.default_delay.lock().unwrap());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let panics = self.panics.lock().unwrap().contains(url);
        if panics {
            panic!("transport blew up on {url}");
        }

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        if let Some(response) = scripted {
            return response;
        }
        if let Some(response) = self.sticky.lock().unwrap().get(url) {
            return response.clone();
        }
        Ok(pdf(b"%PDF-1.7 fake"))
    }
}
