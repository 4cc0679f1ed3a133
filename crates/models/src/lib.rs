use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod text;

use text::{collapse_whitespace, fold_key};

/// Decimal places kept when a unit price is derived from amount / quantity.
pub const UNIT_PRICE_SCALE: u32 = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("invalid date '{0}'")]
    InvalidDate(String),

    #[error("unknown ledger type '{0}'")]
    InvalidLedgerType(String),

    #[error("invalid decimal '{value}' in column {column}")]
    InvalidDecimal { column: &'static str, value: String },
}

// Ledger types

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerType {
    /// Payables (買掛台帳)
    Purchase,
    /// Receivables (売掛台帳)
    Sale,
}

impl LedgerType {
    pub const ALL: [LedgerType; 2] = [LedgerType::Purchase, LedgerType::Sale];

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerType::Purchase => "purchase",
            LedgerType::Sale => "sale",
        }
    }

    /// File name the source export is stored under in the data directory.
    pub fn source_file_name(&self) -> &'static str {
        match self {
            LedgerType::Purchase => "買掛台帳.TXT",
            LedgerType::Sale => "売掛台帳.TXT",
        }
    }

    /// Guesses the ledger from an export file name: 売 means receivables,
    /// 買 means payables.
    pub fn detect_from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy();
        if name.contains('売') {
            Some(LedgerType::Sale)
        } else if name.contains('買') {
            Some(LedgerType::Purchase)
        } else {
            None
        }
    }
}

impl fmt::Display for LedgerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerType {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_key(s).as_str() {
            "purchase" | "purchases" | "buy" | "買掛" | "仕入" => Ok(LedgerType::Purchase),
            "sale" | "sales" | "sell" | "売掛" | "売上" | "販売" => Ok(LedgerType::Sale),
            _ => Err(RecordError::InvalidLedgerType(s.to_string())),
        }
    }
}

// Source fields resolved from headers

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceField {
    Date,
    Year,
    Month,
    Day,
    Counterparty,
    DocumentId,
    Item,
    Description,
    Memo,
    Note,
    Quantity,
    UnitPrice,
    TotalAmount,
    /// Payment or receipt amount, added into `total_amount`.
    Payment,
}

impl SourceField {
    pub const ALL: [SourceField; 14] = [
        SourceField::Date,
        SourceField::Year,
        SourceField::Month,
        SourceField::Day,
        SourceField::Counterparty,
        SourceField::DocumentId,
        SourceField::Item,
        SourceField::Description,
        SourceField::Memo,
        SourceField::Note,
        SourceField::Quantity,
        SourceField::UnitPrice,
        SourceField::TotalAmount,
        SourceField::Payment,
    ];

    /// Reference sub-fields joined into `item_memo`, in join order.
    pub const MEMO_PARTS: [SourceField; 4] = [
        SourceField::Item,
        SourceField::Description,
        SourceField::Memo,
        SourceField::Note,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceField::Date => "date",
            SourceField::Year => "year",
            SourceField::Month => "month",
            SourceField::Day => "day",
            SourceField::Counterparty => "counterparty",
            SourceField::DocumentId => "document_id",
            SourceField::Item => "item",
            SourceField::Description => "description",
            SourceField::Memo => "memo",
            SourceField::Note => "note",
            SourceField::Quantity => "quantity",
            SourceField::UnitPrice => "unit_price",
            SourceField::TotalAmount => "total_amount",
            SourceField::Payment => "payment",
        }
    }
}

impl fmt::Display for SourceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Canonical output schema

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalColumn {
    Date,
    LedgerType,
    Counterparty,
    ItemMemo,
    Quantity,
    UnitPrice,
    TotalAmount,
    DocumentId,
    SearchText,
}

impl CanonicalColumn {
    pub const ALL: [CanonicalColumn; 9] = [
        CanonicalColumn::Date,
        CanonicalColumn::LedgerType,
        CanonicalColumn::Counterparty,
        CanonicalColumn::ItemMemo,
        CanonicalColumn::Quantity,
        CanonicalColumn::UnitPrice,
        CanonicalColumn::TotalAmount,
        CanonicalColumn::DocumentId,
        CanonicalColumn::SearchText,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalColumn::Date => "date",
            CanonicalColumn::LedgerType => "ledger_type",
            CanonicalColumn::Counterparty => "counterparty",
            CanonicalColumn::ItemMemo => "item_memo",
            CanonicalColumn::Quantity => "quantity",
            CanonicalColumn::UnitPrice => "unit_price",
            CanonicalColumn::TotalAmount => "total_amount",
            CanonicalColumn::DocumentId => "document_id",
            CanonicalColumn::SearchText => "search_text",
        }
    }

    /// Header row of every normalized table.
    pub fn header() -> Vec<String> {
        Self::ALL.iter().map(|c| c.as_str().to_string()).collect()
    }
}

// Records

/// Already-normalized inputs of a [`LedgerRecord`]. Derived columns are
/// filled in by [`LedgerRecord::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFields {
    pub date: NaiveDate,
    pub ledger_type: LedgerType,
    pub counterparty: String,
    pub item_memo: String,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub document_id: String,
}

/// One line item in the canonical schema.
///
/// Fields are private so the derived `unit_price` and `search_text` can only
/// come out of [`LedgerRecord::new`] and never drift from their inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerRecord {
    date: NaiveDate,
    ledger_type: LedgerType,
    counterparty: String,
    item_memo: String,
    quantity: Option<Decimal>,
    unit_price: Option<Decimal>,
    total_amount: Option<Decimal>,
    document_id: String,
    #[serde(skip)]
    search_text: String,
}

impl LedgerRecord {
    pub fn new(fields: RecordFields) -> Self {
        let unit_price = fields
            .unit_price
            .or_else(|| derive_unit_price(fields.quantity, fields.total_amount));

        let mut record = Self {
            date: fields.date,
            ledger_type: fields.ledger_type,
            counterparty: collapse_whitespace(&fields.counterparty),
            item_memo: collapse_whitespace(&fields.item_memo),
            quantity: fields.quantity,
            unit_price,
            total_amount: fields.total_amount,
            document_id: collapse_whitespace(&fields.document_id),
            search_text: String::new(),
        };
        record.search_text = build_search_text(&record);
        record
    }

    /// Rebuilds a record from one row of a published table. The stored
    /// search column is ignored and recomputed from the other columns.
    pub fn from_row<S: AsRef<str>>(row: &[S]) -> Result<Self, RecordError> {
        if row.len() != CanonicalColumn::ALL.len() {
            return Err(RecordError::ColumnCount {
                expected: CanonicalColumn::ALL.len(),
                found: row.len(),
            });
        }
        let cell = |column: CanonicalColumn| row[column as usize].as_ref().trim();

        let raw_date = cell(CanonicalColumn::Date);
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .map_err(|_| RecordError::InvalidDate(raw_date.to_string()))?;
        let ledger_type = cell(CanonicalColumn::LedgerType).parse()?;

        let decimal = |column: CanonicalColumn| -> Result<Option<Decimal>, RecordError> {
            let raw = cell(column);
            if raw.is_empty() {
                return Ok(None);
            }
            Decimal::from_str(raw)
                .map(Some)
                .map_err(|_| RecordError::InvalidDecimal {
                    column: column.as_str(),
                    value: raw.to_string(),
                })
        };

        Ok(Self::new(RecordFields {
            date,
            ledger_type,
            counterparty: cell(CanonicalColumn::Counterparty).to_string(),
            item_memo: cell(CanonicalColumn::ItemMemo).to_string(),
            quantity: decimal(CanonicalColumn::Quantity)?,
            unit_price: decimal(CanonicalColumn::UnitPrice)?,
            total_amount: decimal(CanonicalColumn::TotalAmount)?,
            document_id: cell(CanonicalColumn::DocumentId).to_string(),
        }))
    }

    /// Cells in [`CanonicalColumn::ALL`] order.
    pub fn to_row(&self) -> Vec<String> {
        CanonicalColumn::ALL
            .iter()
            .map(|column| self.display_value(*column))
            .collect()
    }

    pub fn display_value(&self, column: CanonicalColumn) -> String {
        let decimal = |value: Option<Decimal>| value.map(|d| d.to_string()).unwrap_or_default();
        match column {
            CanonicalColumn::Date => self.date.format("%Y-%m-%d").to_string(),
            CanonicalColumn::LedgerType => self.ledger_type.as_str().to_string(),
            CanonicalColumn::Counterparty => self.counterparty.clone(),
            CanonicalColumn::ItemMemo => self.item_memo.clone(),
            CanonicalColumn::Quantity => decimal(self.quantity),
            CanonicalColumn::UnitPrice => decimal(self.unit_price),
            CanonicalColumn::TotalAmount => decimal(self.total_amount),
            CanonicalColumn::DocumentId => self.document_id.clone(),
            CanonicalColumn::SearchText => self.search_text.clone(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn ledger_type(&self) -> LedgerType {
        self.ledger_type
    }

    pub fn counterparty(&self) -> &str {
        &self.counterparty
    }

    pub fn item_memo(&self) -> &str {
        &self.item_memo
    }

    pub fn quantity(&self) -> Option<Decimal> {
        self.quantity
    }

    pub fn unit_price(&self) -> Option<Decimal> {
        self.unit_price
    }

    pub fn total_amount(&self) -> Option<Decimal> {
        self.total_amount
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }
}

/// `total_amount / quantity` when both are present and quantity is not zero.
pub fn derive_unit_price(quantity: Option<Decimal>, total_amount: Option<Decimal>) -> Option<Decimal> {
    match (quantity, total_amount) {
        (Some(quantity), Some(total)) if !quantity.is_zero() => total
            .checked_div(quantity)
            .map(|price| price.round_dp(UNIT_PRICE_SCALE).normalize()),
        _ => None,
    }
}

fn build_search_text(record: &LedgerRecord) -> String {
    CanonicalColumn::ALL
        .iter()
        .filter(|c| **c != CanonicalColumn::SearchText)
        .map(|c| fold_key(&record.display_value(*c)))
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A header plus records sharing it.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    pub header: Vec<String>,
    pub records: Vec<LedgerRecord>,
}

impl NormalizedTable {
    pub fn new(records: Vec<LedgerRecord>) -> Self {
        Self {
            header: CanonicalColumn::header(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// Alias table

/// Accepted header spellings per source field, tried in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    fields: BTreeMap<SourceField, Vec<String>>,
}

impl AliasTable {
    pub fn new(fields: BTreeMap<SourceField, Vec<String>>) -> Self {
        Self { fields }
    }

    /// Aliases for both known export layouts plus the English column names
    /// produced by older normalizer versions.
    pub fn builtin() -> Self {
        let entries: [(SourceField, &[&str]); 14] = [
            (
                SourceField::Date,
                &["伝票日付", "日付", "取引日", "売上日", "仕入日", "date", "transaction_date"],
            ),
            (SourceField::Year, &["年", "year"]),
            (SourceField::Month, &["月", "month"]),
            (SourceField::Day, &["日", "day"]),
            (
                SourceField::Counterparty,
                &[
                    "仕入先",
                    "仕入先名",
                    "得意先",
                    "得意先名",
                    "相手先",
                    "取引先",
                    "counterparty",
                    "supplier_name",
                    "customer_name",
                ],
            ),
            (
                SourceField::DocumentId,
                &["伝票番号", "伝票No", "請求番号", "伝票NO.", "document_id", "reference_1"],
            ),
            (SourceField::Item, &["品名", "品目", "商品名", "item"]),
            (SourceField::Description, &["摘要", "description"]),
            (SourceField::Memo, &["備考", "メモ", "memo"]),
            (SourceField::Note, &["数量備考", "注記", "quantity_note", "note"]),
            (SourceField::Quantity, &["数量", "quantity"]),
            (SourceField::UnitPrice, &["単価", "unit_price"]),
            (
                SourceField::TotalAmount,
                &["金額", "税込金額", "税抜金額", "合計金額", "amount", "total_amount"],
            ),
            (
                SourceField::Payment,
                &["支払", "支払額", "支払金額", "入金", "入金額", "payment"],
            ),
        ];

        let fields = entries
            .into_iter()
            .map(|(field, aliases)| (field, aliases.iter().map(|a| a.to_string()).collect()))
            .collect();
        Self { fields }
    }

    pub fn aliases(&self, field: SourceField) -> &[String] {
        self.fields.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replaces the aliases of one field.
    pub fn with_aliases<I, S>(mut self, field: SourceField, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .insert(field, aliases.into_iter().map(Into::into).collect());
        self
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}

// Settings models

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the two source exports under their canonical names.
    pub data_dir: PathBuf,
    /// Combined TSV published by every run.
    pub output_file: PathBuf,
    /// External alias table; the built-in table is used when unset.
    pub aliases_file: Option<PathBuf>,
    /// Source delimiter; detected per file when unset.
    pub delimiter: Option<char>,
    pub host: String,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_file: PathBuf::from("normalized_ledgers.tsv"),
            aliases_file: None,
            delimiter: None,
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Settings {
    pub fn source_path(&self, ledger_type: LedgerType) -> PathBuf {
        self.data_dir.join(ledger_type.source_file_name())
    }
}
