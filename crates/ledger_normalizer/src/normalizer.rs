use std::path::PathBuf;

use chrono::NaiveDate;
use models::text::collapse_whitespace;
use models::{AliasTable, LedgerRecord, LedgerType, NormalizedTable, RecordFields, SourceField};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::amounts::{parse_decimal, sum_present};
use crate::dates::{date_from_parts, parse_date};
use crate::error::{PipelineError, Result, RowError};
use crate::mapper::ColumnMapping;
use crate::reader::{RawRow, SourceTable};
use crate::report::{looks_like_report, ReportNormalizer};

/// How the columns of a source were identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLayout {
    /// Named columns resolved through the alias table.
    Header,
    /// Headerless positional report.
    Report,
}

/// Per-source counts reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub path: PathBuf,
    pub ledger_type: LedgerType,
    pub encoding: String,
    pub layout: SourceLayout,
    pub rows_read: usize,
    pub records: usize,
    pub skipped_empty: usize,
    pub skipped_bad_date: usize,
    /// Block headers, balances and totals of a report.
    pub non_transaction: usize,
    pub numeric_anomalies: usize,
}

impl SourceSummary {
    pub fn skipped(&self) -> usize {
        self.skipped_empty + self.skipped_bad_date
    }
}

/// A normalized row plus the numeric cells that had to be dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub record: LedgerRecord,
    pub numeric_anomalies: Vec<SourceField>,
}

/// Turns raw rows of one source into canonical records.
pub struct RecordNormalizer {
    ledger_type: LedgerType,
    mapping: ColumnMapping,
}

impl RecordNormalizer {
    pub fn new(ledger_type: LedgerType, mapping: ColumnMapping) -> Self {
        Self {
            ledger_type,
            mapping,
        }
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    pub fn normalize_row(&self, row: &RawRow) -> std::result::Result<NormalizedRow, RowError> {
        if row.is_blank() {
            return Err(RowError::EmptyRow);
        }

        let date = self.date(row)?;

        let mut numeric_anomalies = Vec::new();
        let mut number = |field: SourceField| -> Option<Decimal> {
            let raw = self.text(row, field)?;
            match parse_decimal(raw) {
                Ok(value) => value,
                Err(_) => {
                    numeric_anomalies.push(field);
                    None
                }
            }
        };
        let quantity = number(SourceField::Quantity);
        let unit_price = number(SourceField::UnitPrice);
        let amount = number(SourceField::TotalAmount);
        let payment = number(SourceField::Payment);
        let total_amount = sum_present([amount, payment]);

        let item_memo = SourceField::MEMO_PARTS
            .iter()
            .filter_map(|field| self.text(row, *field))
            .map(collapse_whitespace)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let record = LedgerRecord::new(RecordFields {
            date,
            ledger_type: self.ledger_type,
            counterparty: self.text(row, SourceField::Counterparty).unwrap_or_default().to_string(),
            item_memo,
            quantity,
            unit_price,
            total_amount,
            document_id: self.text(row, SourceField::DocumentId).unwrap_or_default().to_string(),
        });

        Ok(NormalizedRow {
            record,
            numeric_anomalies,
        })
    }

    fn text<'r>(&self, row: &'r RawRow, field: SourceField) -> Option<&'r str> {
        self.mapping.index(field).map(|idx| row.cell(idx))
    }

    fn date(&self, row: &RawRow) -> std::result::Result<NaiveDate, RowError> {
        if let Some(raw) = self.text(row, SourceField::Date) {
            return parse_date(raw);
        }

        match (
            self.text(row, SourceField::Year),
            self.text(row, SourceField::Month),
            self.text(row, SourceField::Day),
        ) {
            (Some(year), Some(month), Some(day)) => date_from_parts(year, month, day),
            _ => Err(RowError::DateParse(String::new())),
        }
    }
}

/// Maps the header of `source` once and normalizes every row, skipping the
/// ones that fail and counting why.
///
/// When no alias resolves a date source the file is read as a positional
/// report if any line carries a year/month/day in its first three cells.
/// Otherwise a file with data rows is rejected with
/// [`PipelineError::NoDateColumn`], since none of its rows could be kept.
pub fn normalize_table(
    ledger_type: LedgerType,
    source: &SourceTable,
    aliases: &AliasTable,
) -> Result<(NormalizedTable, SourceSummary)> {
    let mapping = ColumnMapping::resolve(&source.header, aliases);

    let mut summary = SourceSummary {
        path: source.path.clone(),
        ledger_type,
        encoding: source.encoding.name().to_string(),
        layout: SourceLayout::Header,
        rows_read: source.rows.len(),
        records: 0,
        skipped_empty: 0,
        skipped_bad_date: 0,
        non_transaction: 0,
        numeric_anomalies: 0,
    };

    let records = if mapping.has_date_source() {
        let absent: Vec<&str> = mapping.absent().iter().map(|f| f.as_str()).collect();
        tracing::debug!(path = %source.path.display(), ?absent, "column mapping resolved");

        let normalizer = RecordNormalizer::new(ledger_type, mapping);
        collect_records(&source.rows, &mut summary, |row| normalizer.normalize_row(row))
    } else if looks_like_report(source) {
        tracing::info!(path = %source.path.display(), "no header matched, reading as a positional report");

        // The first line was taken for a header but is data here
        let header_row = source.header_row();
        let rows: Vec<&RawRow> = header_row.iter().chain(source.rows.iter()).collect();
        summary.layout = SourceLayout::Report;
        summary.rows_read = rows.len();

        let mut normalizer = ReportNormalizer::new(ledger_type);
        collect_records(rows, &mut summary, |row| normalizer.normalize_row(row))
    } else if source.rows.is_empty() {
        Vec::new()
    } else {
        return Err(PipelineError::NoDateColumn {
            path: source.path.clone(),
            header: source.header.clone(),
        });
    };
    summary.records = records.len();

    Ok((NormalizedTable::new(records), summary))
}

fn collect_records<'a, I, F>(rows: I, summary: &mut SourceSummary, mut normalize: F) -> Vec<LedgerRecord>
where
    I: IntoIterator<Item = &'a RawRow>,
    F: FnMut(&RawRow) -> std::result::Result<NormalizedRow, RowError>,
{
    let mut records = Vec::new();
    for row in rows {
        match normalize(row) {
            Ok(normalized) => {
                for field in &normalized.numeric_anomalies {
                    tracing::debug!(line = row.line, %field, "non-numeric value treated as absent");
                }
                summary.numeric_anomalies += normalized.numeric_anomalies.len();
                records.push(normalized.record);
            }
            Err(RowError::EmptyRow) => summary.skipped_empty += 1,
            Err(RowError::NonTransaction(kind)) => {
                tracing::debug!(line = row.line, %kind, "non-transaction line excluded");
                summary.non_transaction += 1;
            }
            Err(err @ RowError::DateParse(_)) => {
                tracing::debug!(line = row.line, error = %err, "row skipped");
                summary.skipped_bad_date += 1;
            }
        }
    }
    records
}
