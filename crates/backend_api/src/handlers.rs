use axum::{
    extract::{Multipart, RawQuery, State},
    response::{IntoResponse, Response},
    Json,
};
use models::{LedgerRecord, LedgerType};
use serde::Serialize;
use serde_json::json;

use crate::error::ApiError;
use crate::query::TransactionQuery;
use crate::state::AppState;
use crate::upload::{apply_uploads, part_name, UploadedLedger};
use crate::Result;

#[derive(Debug, Serialize)]
pub struct TransactionsResponse<'a> {
    pub count: usize,
    pub items: Vec<&'a LedgerRecord>,
}

/// GET /api/transactions
/// Filtered and sorted records of the published ledger
pub async fn list_transactions(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Response> {
    // `type` repeats, so the query string is decoded as pairs
    let pairs: Vec<(String, String)> = match raw {
        Some(raw) => serde_urlencoded::from_str(&raw)
            .map_err(|e| ApiError::BadRequest(format!("Malformed query string: {e}")))?,
        None => Vec::new(),
    };
    let query = TransactionQuery::from_pairs(pairs)?;

    let dataset = state.repo.dataset().await?;
    let items = dataset.query(&query);
    tracing::debug!(?query, matched = items.len(), "transactions queried");

    // Serialized here since the items borrow the dataset
    Ok(Json(TransactionsResponse {
        count: items.len(),
        items,
    })
    .into_response())
}

/// POST /api/reload
/// Re-reads the published file, for when it was regenerated outside the server
pub async fn reload(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let dataset = state.repo.reload().await?;

    Ok(Json(json!({
        "status": "ok",
        "count": dataset.len(),
    })))
}

/// POST /api/upload_ledgers
/// Multipart with optional `purchase` and `sales` parts
pub async fn upload_ledgers(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut uploads: Vec<UploadedLedger> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let ledger_type = match LedgerType::ALL.into_iter().find(|lt| part_name(*lt) == name) {
            Some(ledger_type) => ledger_type,
            None => {
                tracing::warn!(part = %name, "ignoring unknown upload part");
                continue;
            }
        };

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        // A file input left empty still sends its part
        if bytes.is_empty() {
            continue;
        }

        uploads.retain(|u| u.ledger_type != ledger_type);
        uploads.push(UploadedLedger {
            ledger_type,
            bytes: bytes.to_vec(),
        });
    }

    if uploads.is_empty() {
        return Err(ApiError::BadRequest(
            "no ledger file uploaded (expected parts 'purchase' and/or 'sales')".to_string(),
        ));
    }

    let updated: Vec<&'static str> = uploads.iter().map(UploadedLedger::part_name).collect();

    let summary = {
        let _guard = state.pipeline_lock.lock().await;
        let settings = state.pipeline.clone();
        tokio::task::spawn_blocking(move || apply_uploads(&settings, &uploads))
            .await
            .map_err(|e| ApiError::Internal(format!("pipeline task failed: {e}")))??
    };

    state.repo.reload().await?;
    tracing::info!(?updated, records = summary.records_written, "ledgers uploaded");

    Ok(Json(json!({
        "status": "ok",
        "updated": updated,
        "summary": summary,
    })))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "ledger-viewer"
    }))
}
