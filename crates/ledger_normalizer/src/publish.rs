use std::fs;
use std::io::Write;
use std::path::Path;

use models::NormalizedTable;
use tempfile::NamedTempFile;

use crate::error::{PipelineError, Result};

/// Renders a table as UTF-8 TSV: header first, `\n` line endings, no BOM.
pub fn render_tsv(table: &NormalizedTable) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(&table.header)?;
    for record in &table.records {
        writer.write_record(record.to_row())?;
    }

    writer
        .into_inner()
        .map_err(|e| PipelineError::Render(csv::Error::from(e.into_error())))
}

/// Publishes `table` at `path` by writing a temporary file next to it and
/// renaming it over the destination. Readers see either the previous file
/// or the complete new one.
pub fn publish(table: &NormalizedTable, path: &Path) -> Result<()> {
    let bytes = render_tsv(table)?;
    write_atomic(path, &bytes)?;
    tracing::info!(path = %path.display(), records = table.len(), "normalized ledger published");
    Ok(())
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| PipelineError::write(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PipelineError::write(dir, e))?;
    tmp.write_all(bytes).map_err(|e| PipelineError::write(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| PipelineError::write(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| PipelineError::write(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use models::{LedgerRecord, LedgerType, RecordFields};
    use rust_decimal::Decimal;

    fn table() -> NormalizedTable {
        NormalizedTable::new(vec![LedgerRecord::new(RecordFields {
            date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            ledger_type: LedgerType::Sale,
            counterparty: "株式会社B".to_string(),
            item_memo: "部品 至急".to_string(),
            quantity: Some(Decimal::from(4)),
            unit_price: None,
            total_amount: Some(Decimal::from(1000)),
            document_id: "S-001".to_string(),
        })])
    }

    #[test]
    fn test_render_tsv() {
        let text = String::from_utf8(render_tsv(&table()).unwrap()).unwrap();
        assert_eq!(
            text,
            "date\tledger_type\tcounterparty\titem_memo\tquantity\tunit_price\ttotal_amount\tdocument_id\tsearch_text\n\
             2024-04-01\tsale\t株式会社B\t部品 至急\t4\t250\t1000\tS-001\t2024-04-01 sale 株式会社b 部品至急 4 250 1000 s-001\n"
        );
    }

    #[test]
    fn test_publish_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("normalized.tsv");

        write_atomic(&path, b"old\n").unwrap();
        publish(&table(), &path).unwrap();

        let written = fs::read(&path).unwrap();
        assert_eq!(written, render_tsv(&table()).unwrap());
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
