use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use models::{AliasTable, LedgerType, Settings};
use tokio::sync::Mutex;

use crate::repository::LedgerRepository;

/// Where uploads are stored and how the pipeline is run for them.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub data_dir: PathBuf,
    pub output: PathBuf,
    pub aliases: AliasTable,
    pub delimiter: Option<u8>,
}

impl PipelineSettings {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            data_dir: settings.data_dir.clone(),
            output: settings.output_file.clone(),
            aliases: settings_loader::resolve_alias_table(settings)?,
            delimiter: settings_loader::resolve_delimiter(settings)?,
        })
    }

    pub fn stored_source(&self, ledger_type: LedgerType) -> PathBuf {
        self.data_dir.join(ledger_type.source_file_name())
    }
}

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn LedgerRepository>,
    pub pipeline: Arc<PipelineSettings>,
    /// Held for the whole stage, run and store sequence of an upload.
    pub pipeline_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(repo: Arc<dyn LedgerRepository>, pipeline: PipelineSettings) -> Self {
        Self {
            repo,
            pipeline: Arc::new(pipeline),
            pipeline_lock: Arc::new(Mutex::new(())),
        }
    }
}
