//! Deduplication of candidate document records
//!
//! Two passes, each keeping one record per group:
//! 1. URL pass: records with the same `url` are the same physical document.
//! 2. Semantic pass: records with the same `(canonical company, region, fiscal period,
//!    doc type)` are the same logical document hosted in different places.
//!
//! In both passes the record with the numerically lowest `priority` wins and equal priorities
//! go to the earliest record. Survivors keep their input order, so the output is always a
//! subsequence of the input and running the function twice changes nothing.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::Hash;

use crate::matching::canonical_key;
use crate::types::{DocType, DocumentRecord, FiscalPeriod, Region};

/// Period component of a [`SemanticKey`]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PeriodKey {
    /// Period reported by the source
    Period(FiscalPeriod),
    /// Normalised label, used when no period could be parsed
    Label(String),
}

/// Logical identity of a document
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SemanticKey {
    /// Canonical company key
    pub company: String,
    /// Region
    pub region: Region,
    /// Fiscal period or label
    pub period: PeriodKey,
    /// Document kind
    pub doc_type: DocType,
}

/// Logical identity of `record`, or `None` when it has neither a period nor a label
///
/// Records without a key only take part in the URL pass.
pub fn semantic_key(record: &DocumentRecord) -> Option<SemanticKey> {
    let period = match (&record.fiscal_period, &record.label) {
        (Some(p), _) => PeriodKey::Period(*p),
        (None, Some(label)) => {
            let label = label
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();
            if label.is_empty() {
                return None;
            }
            PeriodKey::Label(label)
        }
        (None, None) => return None,
    };
    Some(SemanticKey {
        company: canonical_key(&record.company.name),
        region: record.region,
        period,
        doc_type: record.doc_type,
    })
}

/// Collapse duplicate records; see the module docs for the rules
pub fn deduplicate(records: Vec<DocumentRecord>) -> Vec<DocumentRecord> {
    let input = records.len();
    let by_url = keep_best_by(records, |r| Some(r.url.clone()));
    let after_url = by_url.len();
    let result = keep_best_by(by_url, semantic_key);

    if result.len() < input {
        tracing::debug!(
            input,
            url_duplicates = input - after_url,
            semantic_duplicates = after_url - result.len(),
            output = result.len(),
            "Collapsed duplicate document records"
        );
    }
    result
}

/// Keep one record per key: lowest priority, then earliest position. Unkeyed records stay.
fn keep_best_by<K, F>(records: Vec<DocumentRecord>, key_of: F) -> Vec<DocumentRecord>
where
    K: Hash + Eq,
    F: Fn(&DocumentRecord) -> Option<K>,
{
    let mut winners: HashMap<K, usize> = HashMap::with_capacity(records.len());
    let mut keep = vec![true; records.len()];

    for (index, record) in records.iter().enumerate() {
        let Some(key) = key_of(record) else { continue };
        match winners.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(index);
            }
            Entry::Occupied(mut slot) => {
                let current = *slot.get();
                if record.priority < records[current].priority {
                    keep[current] = false;
                    slot.insert(index);
                } else {
                    keep[index] = false;
                }
            }
        }
    }

    records
        .into_iter()
        .zip(keep)
        .filter_map(|(record, kept)| kept.then_some(record))
        .collect()
}
