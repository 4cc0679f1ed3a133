use std::path::{Path, PathBuf};

use models::{AliasTable, LedgerType, NormalizedTable};
use serde::Serialize;

use crate::combiner::combine;
use crate::error::Result;
use crate::normalizer::{normalize_table, SourceSummary};
use crate::publish::publish;
use crate::reader::read_source;

/// Inputs of one normalization run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub payables: PathBuf,
    pub receivables: PathBuf,
    pub output: PathBuf,
    pub aliases: AliasTable,
    /// `None` detects the delimiter per file.
    pub delimiter: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub payables: SourceSummary,
    pub receivables: SourceSummary,
    pub records_written: usize,
    pub output: PathBuf,
}

impl RunSummary {
    pub fn skipped(&self) -> usize {
        self.payables.skipped() + self.receivables.skipped()
    }
}

/// Reads, maps and normalizes a single source without publishing anything.
pub fn normalize_file(
    ledger_type: LedgerType,
    path: &Path,
    aliases: &AliasTable,
    delimiter: Option<u8>,
) -> Result<(NormalizedTable, SourceSummary)> {
    let source = read_source(path, delimiter)?;
    let (table, summary) = normalize_table(ledger_type, &source, aliases)?;

    tracing::info!(
        path = %path.display(),
        %ledger_type,
        encoding = %summary.encoding,
        layout = ?summary.layout,
        rows = summary.rows_read,
        records = summary.records,
        skipped_empty = summary.skipped_empty,
        skipped_bad_date = summary.skipped_bad_date,
        non_transaction = summary.non_transaction,
        numeric_anomalies = summary.numeric_anomalies,
        "source normalized"
    );

    Ok((table, summary))
}

/// Both sources normalized and combined, not yet written.
#[derive(Debug)]
pub struct PreparedRun {
    pub table: NormalizedTable,
    pub payables: SourceSummary,
    pub receivables: SourceSummary,
}

impl PreparedRun {
    /// Atomically replaces `output` with the combined table.
    pub fn publish(self, output: &Path) -> Result<RunSummary> {
        publish(&self.table, output)?;

        Ok(RunSummary {
            payables: self.payables,
            receivables: self.receivables,
            records_written: self.table.len(),
            output: output.to_path_buf(),
        })
    }
}

/// Reads and normalizes both sources. Nothing is written, so any failure
/// here leaves the published file as it was.
pub fn prepare(config: &PipelineConfig) -> Result<PreparedRun> {
    let (payables, payables_summary) = normalize_file(
        LedgerType::Purchase,
        &config.payables,
        &config.aliases,
        config.delimiter,
    )?;
    let (receivables, receivables_summary) = normalize_file(
        LedgerType::Sale,
        &config.receivables,
        &config.aliases,
        config.delimiter,
    )?;

    Ok(PreparedRun {
        table: combine(payables, receivables)?,
        payables: payables_summary,
        receivables: receivables_summary,
    })
}

/// Full run: [`prepare`] then publish to `config.output`.
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    prepare(config)?.publish(&config.output)
}
