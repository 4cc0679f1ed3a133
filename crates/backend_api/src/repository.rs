use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{ApiError, Result};
use crate::query::Dataset;

/// Access to the published normalized ledger.
/// The query handlers only see this trait, so tests can serve a fixed dataset.
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// The cached dataset, loaded on first use.
    async fn dataset(&self) -> Result<Arc<Dataset>>;
    /// Re-reads the published file and replaces the cache.
    async fn reload(&self) -> Result<Arc<Dataset>>;
}

/// Reads the published TSV from disk and keeps the last good copy.
pub struct FileLedgerRepository {
    path: PathBuf,
    cache: RwLock<Option<Arc<Dataset>>>,
}

impl FileLedgerRepository {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Dataset> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ApiError::DatasetUnavailable(self.path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let dataset = Dataset::from_tsv(&bytes)?;
        tracing::info!(path = %self.path.display(), records = dataset.len(), "normalized ledger loaded");
        Ok(dataset)
    }
}

#[async_trait]
impl LedgerRepository for FileLedgerRepository {
    async fn dataset(&self) -> Result<Arc<Dataset>> {
        {
            let cache = self.cache.read().await;
            if let Some(dataset) = cache.as_ref() {
                return Ok(Arc::clone(dataset));
            }
        }

        let mut cache = self.cache.write().await;
        // Another request may have filled it while we waited for the lock
        if let Some(dataset) = cache.as_ref() {
            return Ok(Arc::clone(dataset));
        }
        let dataset = Arc::new(self.load().await?);
        *cache = Some(Arc::clone(&dataset));
        Ok(dataset)
    }

    async fn reload(&self) -> Result<Arc<Dataset>> {
        let dataset = Arc::new(self.load().await?);
        let mut cache = self.cache.write().await;
        *cache = Some(Arc::clone(&dataset));
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "date\tledger_type\tcounterparty\titem_memo\tquantity\tunit_price\ttotal_amount\tdocument_id\tsearch_text\n";

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileLedgerRepository::new(dir.path().join("missing.tsv"));
        let err = repo.dataset().await.unwrap_err();
        assert!(matches!(err, ApiError::DatasetUnavailable(_)));
    }

    #[tokio::test]
    async fn test_cache_is_kept_until_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("normalized.tsv");
        std::fs::write(&path, format!("{HEADER}2024-04-01\tsale\tB\t\t\t\t100\t\t\n")).unwrap();

        let repo = FileLedgerRepository::new(&path);
        assert_eq!(repo.dataset().await.unwrap().len(), 1);

        std::fs::write(&path, HEADER).unwrap();
        assert_eq!(repo.dataset().await.unwrap().len(), 1);
        assert_eq!(repo.reload().await.unwrap().len(), 0);
        assert!(repo.dataset().await.unwrap().is_empty());
    }
}
