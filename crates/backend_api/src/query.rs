use std::cmp::Ordering;

use chrono::NaiveDate;
use ledger_normalizer::parse_date;
use models::text::{collapse_whitespace, fold_key};
use models::{CanonicalColumn, LedgerRecord, LedgerType, RecordError};
use thiserror::Error;

use crate::error::{ApiError, Result};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read normalized ledger: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unexpected header in normalized ledger: {0:?}")]
    Header(Vec<String>),

    #[error("Bad record on line {line}: {source}")]
    Record {
        line: u64,
        #[source]
        source: RecordError,
    },
}

/// Filters of `GET /api/transactions`. Every filter is optional and they
/// combine with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Empty means every ledger type.
    pub ledger_types: Vec<LedgerType>,
    /// Already folded with [`fold_key`].
    pub keyword: Option<String>,
    pub document_id: Option<String>,
    pub document_date: Option<NaiveDate>,
}

impl TransactionQuery {
    /// Builds the query from decoded `key=value` pairs. `type` may repeat;
    /// empty values count as not given and unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut query = TransactionQuery::default();

        for (key, value) in pairs {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "start_date" => query.start_date = Some(date_param(&key, value)?),
                "end_date" => query.end_date = Some(date_param(&key, value)?),
                "document_date" => query.document_date = Some(date_param(&key, value)?),
                "type" => {
                    let ledger_type = value
                        .parse::<LedgerType>()
                        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                    if !query.ledger_types.contains(&ledger_type) {
                        query.ledger_types.push(ledger_type);
                    }
                }
                "q" => {
                    let keyword = fold_key(value);
                    query.keyword = (!keyword.is_empty()).then_some(keyword);
                }
                "document_id" => query.document_id = Some(collapse_whitespace(value)),
                _ => tracing::debug!(%key, "ignoring unknown query parameter"),
            }
        }

        Ok(query)
    }

    pub fn matches(&self, record: &LedgerRecord) -> bool {
        let date = record.date();
        self.start_date.map_or(true, |start| date >= start)
            && self.end_date.map_or(true, |end| date <= end)
            && self.document_date.map_or(true, |day| date == day)
            && (self.ledger_types.is_empty() || self.ledger_types.contains(&record.ledger_type()))
            && self
                .keyword
                .as_deref()
                .map_or(true, |keyword| record.search_text().contains(keyword))
            && self
                .document_id
                .as_deref()
                .map_or(true, |id| record.document_id() == id)
    }
}

fn date_param(key: &str, value: &str) -> Result<NaiveDate> {
    parse_date(value).map_err(|_| ApiError::InvalidDateFormat(format!("{key}={value}")))
}

/// The published table loaded into memory, records in file order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<LedgerRecord>,
}

impl Dataset {
    pub fn new(records: Vec<LedgerRecord>) -> Self {
        Self { records }
    }

    /// Parses a published TSV. The header must be the canonical one.
    pub fn from_tsv(bytes: &[u8]) -> std::result::Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(bytes);

        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if header != CanonicalColumn::header() {
            return Err(DatasetError::Header(header));
        }

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let line = row.position().map(|p| p.line()).unwrap_or(0);
            let cells: Vec<&str> = row.iter().collect();
            let record = LedgerRecord::from_row(&cells)
                .map_err(|source| DatasetError::Record { line, source })?;
            records.push(record);
        }

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Matching records, newest first, then by document id with empty ids
    /// last. Ties keep file order.
    pub fn query(&self, query: &TransactionQuery) -> Vec<&LedgerRecord> {
        let mut matched: Vec<&LedgerRecord> =
            self.records.iter().filter(|r| query.matches(r)).collect();
        matched.sort_by(|a, b| compare_for_listing(a, b));
        matched
    }
}

fn compare_for_listing(a: &LedgerRecord, b: &LedgerRecord) -> Ordering {
    b.date().cmp(&a.date()).then_with(|| {
        match (a.document_id().is_empty(), b.document_id().is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => a.document_id().cmp(b.document_id()),
        }
    })
}
