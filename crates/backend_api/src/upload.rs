use std::fs;

use ledger_normalizer::{prepare, write_atomic, PipelineConfig, RunSummary};
use models::LedgerType;

use crate::error::Result;
use crate::state::PipelineSettings;

/// One uploaded source export.
#[derive(Debug, Clone)]
pub struct UploadedLedger {
    pub ledger_type: LedgerType,
    pub bytes: Vec<u8>,
}

impl UploadedLedger {
    /// Multipart part name for this ledger.
    pub fn part_name(&self) -> &'static str {
        part_name(self.ledger_type)
    }
}

pub fn part_name(ledger_type: LedgerType) -> &'static str {
    match ledger_type {
        LedgerType::Purchase => "purchase",
        LedgerType::Sale => "sales",
    }
}

/// Stages the uploads and normalizes them in place of the stored sources.
/// Only when both sources normalize are the uploads stored in the data
/// directory, and the table is published last, so a published table always
/// has its sources on disk. A failing read leaves both the stored sources
/// and the published table untouched.
///
/// Blocking; call from `spawn_blocking`.
pub fn apply_uploads(settings: &PipelineSettings, uploads: &[UploadedLedger]) -> Result<RunSummary> {
    let staging = tempfile::Builder::new().prefix("ledger-upload").tempdir()?;

    let mut config = PipelineConfig {
        payables: settings.stored_source(LedgerType::Purchase),
        receivables: settings.stored_source(LedgerType::Sale),
        output: settings.output.clone(),
        aliases: settings.aliases.clone(),
        delimiter: settings.delimiter,
    };

    for upload in uploads {
        let staged = staging.path().join(upload.ledger_type.source_file_name());
        fs::write(&staged, &upload.bytes)?;
        match upload.ledger_type {
            LedgerType::Purchase => config.payables = staged,
            LedgerType::Sale => config.receivables = staged,
        }
    }

    let mut prepared = prepare(&config)?;

    for upload in uploads {
        let stored = settings.stored_source(upload.ledger_type);
        write_atomic(&stored, &upload.bytes)?;
        tracing::info!(path = %stored.display(), bytes = upload.bytes.len(), "uploaded ledger stored");

        // Report the stored location, not the staging one
        match upload.ledger_type {
            LedgerType::Purchase => prepared.payables.path = stored,
            LedgerType::Sale => prepared.receivables.path = stored,
        }
    }

    Ok(prepared.publish(&settings.output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::AliasTable;

    const PURCHASE: &str = "伝票日付,仕入先,金額\n2024/04/01,A社,1000\n";
    const SALE: &str = "売上日,得意先名,金額\n2024/04/02,B社,2000\n";

    fn uploads() -> Vec<UploadedLedger> {
        vec![
            UploadedLedger {
                ledger_type: LedgerType::Purchase,
                bytes: PURCHASE.as_bytes().to_vec(),
            },
            UploadedLedger {
                ledger_type: LedgerType::Sale,
                bytes: SALE.as_bytes().to_vec(),
            },
        ]
    }

    fn settings(data_dir: std::path::PathBuf, output: std::path::PathBuf) -> PipelineSettings {
        PipelineSettings {
            data_dir,
            output,
            aliases: AliasTable::builtin(),
            delimiter: None,
        }
    }

    #[test]
    fn test_sources_stored_before_publish() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path().join("data"), dir.path().join("ledger.tsv"));

        let summary = apply_uploads(&settings, &uploads()).unwrap();
        assert_eq!(summary.records_written, 2);
        assert_eq!(summary.payables.path, settings.stored_source(LedgerType::Purchase));
        assert_eq!(
            fs::read_to_string(settings.stored_source(LedgerType::Sale)).unwrap(),
            SALE
        );
        assert!(settings.output.exists());
    }

    #[test]
    fn test_failed_store_does_not_publish() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the data directory should be
        let data_dir = dir.path().join("data");
        fs::write(&data_dir, "not a directory").unwrap();
        let settings = settings(data_dir, dir.path().join("ledger.tsv"));

        assert!(apply_uploads(&settings, &uploads()).is_err());
        assert!(!settings.output.exists());
    }
}
