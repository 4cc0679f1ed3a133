use backend_api::{run_server, AppState, FileLedgerRepository, LedgerRepository, PipelineSettings};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init(logger::DEFAULT_FILTER);

    // settings.json first, then environment overrides
    let settings_path = env::var("LEDGER_SETTINGS").ok().map(PathBuf::from);
    let mut settings = settings_loader::load_settings_with_fallback(settings_path.as_ref())?;

    if let Ok(host) = env::var("HOST") {
        settings.host = host;
    }
    if let Ok(port) = env::var("PORT") {
        settings.port = port
            .parse()
            .with_context(|| format!("PORT must be a port number, got '{}'", port))?;
    }
    if let Ok(data_file) = env::var("DATA_FILE") {
        settings.output_file = PathBuf::from(data_file);
    }
    if let Ok(data_dir) = env::var("DATA_DIR") {
        settings.data_dir = PathBuf::from(data_dir);
    }

    let pipeline = PipelineSettings::from_settings(&settings)?;

    println!("Ledger Viewer API Server");
    println!("========================");
    println!("Data dir: {}", settings.data_dir.display());
    println!("Normalized ledger: {}", settings.output_file.display());
    println!("Listening on: {}:{}", settings.host, settings.port);
    println!();

    let repo = Arc::new(FileLedgerRepository::new(&settings.output_file));

    // Not fatal: the first upload publishes the file
    if let Err(e) = repo.dataset().await {
        tracing::warn!(error = %e, "normalized ledger not loaded at startup");
    }

    let state = AppState::new(repo, pipeline);
    run_server(state, &settings.host, settings.port).await?;

    Ok(())
}
