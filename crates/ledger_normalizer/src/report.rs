//! Headerless ledger report layout.
//!
//! The accounting package prints 買掛台帳 and 売掛台帳 as positional
//! reports with no header line:
//!
//! ```text
//! ,,,株式会社山田商店,...          <- counterparty block header
//! ,,,繰 越 残 高,...,50000         <- opening balance (excluded)
//! 2024,4,1,ボルト,1001,M8,...      <- detail line: year, month, day, ...
//! ,,,月 計,...                     <- totals (excluded)
//! ```
//!
//! A block header names the counterparty of every detail line below it
//! until the next block header.

use std::fmt;

use chrono::NaiveDate;
use models::text::collapse_whitespace;
use models::{LedgerRecord, LedgerType, RecordFields, SourceField};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::amounts::{parse_decimal, sum_present};
use crate::dates::date_from_parts;
use crate::error::RowError;
use crate::normalizer::NormalizedRow;
use crate::reader::{RawRow, SourceTable};

/// Columns that may hold references (document numbers, notes), minus the
/// one chosen as the description.
const REFERENCE_COLUMNS: [usize; 7] = [3, 4, 5, 6, 7, 8, 9];
const MAX_REFERENCES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    CounterpartyHeader,
    OpeningBalance,
    Summary,
    Payment,
    Tax,
    Detail,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::CounterpartyHeader => "counterparty_header",
            EntryKind::OpeningBalance => "opening_balance",
            EntryKind::Summary => "summary",
            EntryKind::Payment => "payment",
            EntryKind::Tax => "tax",
            EntryKind::Detail => "detail",
        }
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self, EntryKind::Payment | EntryKind::Tax | EntryKind::Detail)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column positions of one ledger's report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLayout {
    /// Tried in order; the first non-empty cell is the description.
    pub description: &'static [usize],
    pub quantity: usize,
    /// Tried in order; the first non-empty cell is kept.
    pub quantity_note: &'static [usize],
    pub unit_price: usize,
    pub amount: usize,
    /// Summed.
    pub payment: &'static [usize],
}

impl ReportLayout {
    pub fn for_ledger(ledger_type: LedgerType) -> Self {
        match ledger_type {
            LedgerType::Purchase => Self {
                description: &[3, 4, 5, 6, 7, 8],
                quantity: 9,
                quantity_note: &[10],
                unit_price: 13,
                amount: 14,
                payment: &[15],
            },
            LedgerType::Sale => Self {
                description: &[5, 6, 3, 4, 7, 8],
                quantity: 11,
                quantity_note: &[9, 10],
                unit_price: 14,
                amount: 15,
                payment: &[16, 17],
            },
        }
    }
}

/// True when some line, the one read as header included, carries a valid
/// date in its first three cells.
pub fn looks_like_report(source: &SourceTable) -> bool {
    let header_row = source.header_row();
    header_row
        .iter()
        .chain(source.rows.iter())
        .any(|row| row_date(row).is_ok())
}

fn row_date(row: &RawRow) -> Result<NaiveDate, RowError> {
    date_from_parts(row.cell(0), row.cell(1), row.cell(2))
}

/// Classifies a line by its year cell and description text.
pub fn classify(row: &RawRow, description: &str) -> EntryKind {
    let label: String = description.chars().filter(|c| !c.is_whitespace()).collect();

    if label.contains("繰越残高") {
        return EntryKind::OpeningBalance;
    }
    if row.cell(0).trim().is_empty() && !label.is_empty() {
        if label.contains('計') || label.contains('―') || label.contains("残高") {
            return EntryKind::Summary;
        }
        return EntryKind::CounterpartyHeader;
    }

    let is_total = label.contains('計') || label.contains("繰越");
    if (label.contains("支払") || label.contains("入金")) && !is_total {
        return EntryKind::Payment;
    }
    if label.contains("消費税") {
        return EntryKind::Tax;
    }
    EntryKind::Detail
}

/// Turns report lines into canonical records.
///
/// Stateful: lines must be fed in file order so block headers reach the
/// lines below them.
pub struct ReportNormalizer {
    ledger_type: LedgerType,
    layout: ReportLayout,
    counterparty: String,
}

impl ReportNormalizer {
    pub fn new(ledger_type: LedgerType) -> Self {
        Self {
            ledger_type,
            layout: ReportLayout::for_ledger(ledger_type),
            counterparty: String::new(),
        }
    }

    /// Counterparty of the current block.
    pub fn counterparty(&self) -> &str {
        &self.counterparty
    }

    pub fn normalize_row(&mut self, row: &RawRow) -> Result<NormalizedRow, RowError> {
        if row.is_blank() {
            return Err(RowError::EmptyRow);
        }

        let description = self.description(row);
        let kind = classify(row, description.map(|(_, text)| text).unwrap_or(""));
        if kind == EntryKind::CounterpartyHeader {
            self.counterparty = collapse_whitespace(description.map(|(_, text)| text).unwrap_or(""));
        }
        if !kind.is_transaction() {
            return Err(RowError::NonTransaction(kind));
        }

        let date = row_date(row)?;

        let mut numeric_anomalies = Vec::new();
        let mut number = |field: SourceField, idx: usize| -> Option<Decimal> {
            match parse_decimal(row.cell(idx)) {
                Ok(value) => value,
                Err(_) => {
                    numeric_anomalies.push(field);
                    None
                }
            }
        };
        let quantity = number(SourceField::Quantity, self.layout.quantity);
        let unit_price = number(SourceField::UnitPrice, self.layout.unit_price);
        let amount = number(SourceField::TotalAmount, self.layout.amount);
        let payments: Vec<Option<Decimal>> = self
            .layout
            .payment
            .iter()
            .map(|idx| number(SourceField::Payment, *idx))
            .collect();
        let total_amount = sum_present(std::iter::once(amount).chain(payments));

        let description_idx = description.map(|(idx, _)| idx);
        let references: Vec<&str> = REFERENCE_COLUMNS
            .iter()
            .filter(|idx| Some(**idx) != description_idx)
            .take(MAX_REFERENCES)
            .map(|idx| row.cell(*idx).trim())
            .collect();
        let document_id = references.first().copied().unwrap_or("");

        let note = self
            .layout
            .quantity_note
            .iter()
            .map(|idx| row.cell(*idx).trim())
            .find(|text| !text.is_empty())
            .unwrap_or("");

        let item_memo = description
            .map(|(_, text)| text)
            .into_iter()
            .chain(references.iter().skip(1).copied())
            .chain(std::iter::once(note))
            .map(collapse_whitespace)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let record = LedgerRecord::new(RecordFields {
            date,
            ledger_type: self.ledger_type,
            counterparty: self.counterparty.clone(),
            item_memo,
            quantity,
            unit_price,
            total_amount,
            document_id: document_id.to_string(),
        });

        Ok(NormalizedRow {
            record,
            numeric_anomalies,
        })
    }

    fn description<'r>(&self, row: &'r RawRow) -> Option<(usize, &'r str)> {
        self.layout
            .description
            .iter()
            .map(|idx| (*idx, row.cell(*idx).trim()))
            .find(|(_, text)| !text.is_empty())
    }
}
