//! Core types for earnings-dl

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Market region a document source serves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// India (BSE/NSE listed companies)
    India,
    /// United States
    Us,
    /// Japan
    Japan,
    /// South Korea
    Korea,
    /// Mainland China
    China,
}

impl Region {
    /// Every region, in declaration order
    pub const ALL: [Region; 5] = [
        Region::India,
        Region::Us,
        Region::Japan,
        Region::Korea,
        Region::China,
    ];

    /// Lowercase identifier used in configuration and serialized output
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::India => "india",
            Region::Us => "us",
            Region::Japan => "japan",
            Region::Korea => "korea",
            Region::China => "china",
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Region::India => "India",
            Region::Us => "United States",
            Region::Japan => "Japan",
            Region::Korea => "South Korea",
            Region::China => "China",
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Region {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Region::ALL
            .into_iter()
            .find(|r| r.as_str() == wanted)
            .ok_or_else(|| crate::error::Error::config("region", format!("invalid region: {s}")))
    }
}

/// How a source numbers its fiscal years
///
/// The pipeline never does calendar arithmetic with this; it is carried so collaborators can
/// render periods (e.g. in file names) the way the source meant them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiscalYearConvention {
    /// Fiscal year runs January to December
    Calendar,
    /// Fiscal year runs April to March (India, Japan)
    AprilToMarch,
}

/// Fiscal quarter as reported by a source
///
/// Ordering is by `(year, quarter)` and is only meaningful between periods produced under the
/// same [`FiscalYearConvention`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawFiscalPeriod")]
pub struct FiscalPeriod {
    year: i32,
    quarter: u8,
}

#[derive(Deserialize)]
struct RawFiscalPeriod {
    year: i32,
    quarter: u8,
}

impl TryFrom<RawFiscalPeriod> for FiscalPeriod {
    type Error = String;

    fn try_from(raw: RawFiscalPeriod) -> std::result::Result<Self, Self::Error> {
        Self::new(raw.year, raw.quarter)
            .ok_or_else(|| format!("quarter must be between 1 and 4, got {}", raw.quarter))
    }
}

#[allow(clippy::expect_used)]
fn quarter_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)Q([1-4])\s*(?:FY)?\s*'?(\d{4}|\d{2})\b").expect("valid quarter regex")
    })
}

impl FiscalPeriod {
    /// Create a period, rejecting quarters outside 1..=4
    pub fn new(year: i32, quarter: u8) -> Option<Self> {
        (1..=4)
            .contains(&quarter)
            .then_some(Self { year, quarter })
    }

    /// Fiscal year, four digits
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Quarter, 1..=4
    pub fn quarter(&self) -> u8 {
        self.quarter
    }

    /// Extract a period from free text such as `"Q3FY26"`, `"Q3 FY2026"` or `"Q3 2025"`
    ///
    /// Two-digit years are taken as 20xx. Returns `None` when nothing period-like is found.
    pub fn parse_label(text: &str) -> Option<Self> {
        let caps = quarter_label_regex().captures(text)?;
        let quarter: u8 = caps.get(1)?.as_str().parse().ok()?;
        let year_str = caps.get(2)?.as_str();
        let mut year: i32 = year_str.parse().ok()?;
        if year_str.len() == 2 {
            year += 2000;
        }
        Self::new(year, quarter)
    }
}

impl std::fmt::Display for FiscalPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Q{} {}", self.quarter, self.year)
    }
}

/// Kind of earnings document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    /// Earnings call transcript
    Transcript,
    /// Investor presentation
    Presentation,
    /// Press release or factsheet
    PressRelease,
}

impl DocType {
    /// Every document type
    pub const ALL: [DocType; 3] = [
        DocType::Transcript,
        DocType::Presentation,
        DocType::PressRelease,
    ];

    /// Snake-case identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Transcript => "transcript",
            DocType::Presentation => "presentation",
            DocType::PressRelease => "press_release",
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Company identity as reported by a source
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyIdentity {
    /// Display name (e.g. "Reliance Industries Ltd.")
    pub name: String,
    /// Ticker or scrip code
    #[serde(default)]
    pub ticker: Option<String>,
    /// Exchange code (e.g. "BSE", "NYSE")
    #[serde(default)]
    pub exchange: Option<String>,
}

impl CompanyIdentity {
    /// Identity with only a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ticker: None,
            exchange: None,
        }
    }

    /// Attach a ticker
    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = Some(ticker.into());
        self
    }

    /// Attach an exchange code
    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    /// Normalised comparison key for the name
    pub fn canonical_key(&self) -> String {
        crate::matching::canonical_key(&self.name)
    }
}

/// A company candidate returned by a source's search
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyMatch {
    /// The company as the source names it
    pub identity: CompanyIdentity,
    /// Source-specific key (CIK, scrip code, page slug) needed to list documents
    #[serde(default)]
    pub source_key: Option<String>,
    /// Company page on the source, if any
    #[serde(default)]
    pub page_url: Option<String>,
}

impl CompanyMatch {
    /// Candidate with only an identity
    pub fn new(identity: CompanyIdentity) -> Self {
        Self {
            identity,
            source_key: None,
            page_url: None,
        }
    }

    /// Attach the source-specific lookup key
    pub fn with_source_key(mut self, key: impl Into<String>) -> Self {
        self.source_key = Some(key.into());
        self
    }

    /// Attach the company page URL
    pub fn with_page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = Some(url.into());
        self
    }
}

/// A company candidate scored against a query
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch {
    /// The candidate
    pub company: CompanyMatch,
    /// Source that produced it
    pub source_name: String,
    /// Region of that source
    pub region: Region,
    /// Similarity to the query, 0..=100
    pub score: f64,
}

/// One discoverable document
///
/// Records are created by a source and never mutated afterwards. `url` identifies the
/// physical document; `(company, region, fiscal_period, doc_type)` identifies the logical one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Company the document belongs to
    pub company: CompanyIdentity,
    /// Region of the producing source
    pub region: Region,
    /// Fiscal quarter, if the source could determine it
    #[serde(default)]
    pub fiscal_period: Option<FiscalPeriod>,
    /// Document kind
    pub doc_type: DocType,
    /// Canonical download URL
    pub url: String,
    /// Name of the producing source
    pub source_name: String,
    /// Priority of the producing source (lower = more authoritative)
    pub priority: u32,
    /// Free-text label used when the period could not be parsed exactly
    #[serde(default)]
    pub label: Option<String>,
    /// Publication or filing date, if known
    #[serde(default)]
    pub published: Option<NaiveDate>,
}

impl DocumentRecord {
    /// Create a record; prefer [`DocumentSource::record`](crate::source::DocumentSource::record)
    /// inside source implementations so the source metadata is stamped consistently.
    pub fn new(
        company: CompanyIdentity,
        region: Region,
        doc_type: DocType,
        url: impl Into<String>,
        source_name: impl Into<String>,
        priority: u32,
    ) -> Self {
        Self {
            company,
            region,
            fiscal_period: None,
            doc_type,
            url: url.into(),
            source_name: source_name.into(),
            priority,
            label: None,
            published: None,
        }
    }

    /// Set the fiscal period
    pub fn with_period(mut self, period: FiscalPeriod) -> Self {
        self.fiscal_period = Some(period);
        self
    }

    /// Set the label, also filling the period from it when none is set yet
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        if self.fiscal_period.is_none() {
            self.fiscal_period = FiscalPeriod::parse_label(&label);
        }
        self.label = Some(label);
        self
    }

    /// Set the publication date
    pub fn with_published(mut self, date: NaiveDate) -> Self {
        self.published = Some(date);
        self
    }

    /// File-system safe stem such as `Acme_Q3_2026_transcript`
    pub fn file_stem(&self) -> String {
        let company: String = self
            .company
            .name
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .chars()
            .take(50)
            .collect();
        let period = match self.fiscal_period {
            Some(p) => format!("Q{}_{}", p.quarter, p.year),
            None => "undated".to_string(),
        };
        format!("{company}_{period}_{}", self.doc_type)
    }

    /// File extension guessed from the URL path, `.pdf` when nothing better is known
    pub fn extension(&self) -> &'static str {
        let path = url::Url::parse(&self.url)
            .map(|u| u.path().to_ascii_lowercase())
            .unwrap_or_else(|_| self.url.to_ascii_lowercase());
        if path.ends_with(".pptx") || path.ends_with(".ppt") {
            ".pptx"
        } else if path.ends_with(".mp3") || path.ends_with(".wav") {
            ".mp3"
        } else {
            ".pdf"
        }
    }
}

/// Outcome of retrieving one document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    /// Bytes retrieved and passed the sanity check
    Ok,
    /// Retries exhausted, payload rejected, or abandoned mid-flight
    Failed,
    /// Never attempted (batch cancelled first)
    Skipped,
}

/// Retrieval result for one [`DocumentRecord`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    /// The record this result belongs to
    pub record: DocumentRecord,
    /// Outcome
    pub status: FetchStatus,
    /// Number of requests made (0 when skipped)
    pub attempts: u32,
    /// Last failure reason
    pub error: Option<String>,
    /// Response content type, when a response was received
    pub content_type: Option<String>,
    /// Document bytes (only when `status` is `Ok`)
    #[serde(skip)]
    pub bytes: Option<Vec<u8>>,
}

impl FetchResult {
    pub(crate) fn ok(
        record: DocumentRecord,
        attempts: u32,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Self {
        Self {
            record,
            status: FetchStatus::Ok,
            attempts,
            error: None,
            content_type,
            bytes: Some(bytes),
        }
    }

    pub(crate) fn failed(record: DocumentRecord, attempts: u32, error: impl Into<String>) -> Self {
        Self {
            record,
            status: FetchStatus::Failed,
            attempts,
            error: Some(error.into()),
            content_type: None,
            bytes: None,
        }
    }

    pub(crate) fn skipped(record: DocumentRecord, reason: impl Into<String>) -> Self {
        Self {
            record,
            status: FetchStatus::Skipped,
            attempts: 0,
            error: Some(reason.into()),
            content_type: None,
            bytes: None,
        }
    }

    /// Whether the document was retrieved
    pub fn is_ok(&self) -> bool {
        self.status == FetchStatus::Ok
    }
}

/// Counts over a batch of [`FetchResult`]s
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSummary {
    /// Number of results
    pub total: usize,
    /// Results with status `Ok`
    pub succeeded: usize,
    /// Results with status `Failed`
    pub failed: usize,
    /// Results with status `Skipped`
    pub skipped: usize,
    /// First failure reason encountered, in input order
    pub first_error: Option<String>,
}

impl FetchSummary {
    /// Tally a batch
    pub fn from_results(results: &[FetchResult]) -> Self {
        let mut summary = FetchSummary {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            match result.status {
                FetchStatus::Ok => summary.succeeded += 1,
                FetchStatus::Failed => summary.failed += 1,
                FetchStatus::Skipped => summary.skipped += 1,
            }
            if result.status != FetchStatus::Ok && summary.first_error.is_none() {
                summary.first_error = result.error.clone();
            }
        }
        summary
    }

    /// True when every document was retrieved
    pub fn is_complete(&self) -> bool {
        self.succeeded == self.total
    }
}

/// Why a source contributed nothing to an aggregation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Transport failure or error returned by the source
    SourceUnavailable,
    /// The source exceeded its time bound
    Timeout,
    /// No candidate scored above the match threshold
    NoMatch,
}

/// Non-fatal report about one source during an aggregation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceDiagnostic {
    /// Source concerned
    pub source_name: String,
    /// Region that was queried
    pub region: Region,
    /// Company token that was being resolved
    pub query: String,
    /// Category
    pub kind: DiagnosticKind,
    /// Detail
    pub message: String,
}

/// Deduplicated discovery result plus per-source diagnostics
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Canonical document list, companies in query order
    pub documents: Vec<DocumentRecord>,
    /// Sources that failed, timed out or found no match
    pub diagnostics: Vec<SourceDiagnostic>,
}

impl Aggregation {
    /// Number of documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// True when no documents were found
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// A region with at least one registered source
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionInfo {
    /// Region
    pub region: Region,
    /// Human-readable name
    pub display_name: String,
    /// Fiscal convention of the region's highest-priority source
    pub fiscal_year: FiscalYearConvention,
    /// Source names in priority order
    pub sources: Vec<String>,
}
