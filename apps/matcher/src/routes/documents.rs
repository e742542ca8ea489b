use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::gateway::{DocumentId, DocumentStatus, StoredDocument};
use crate::routes::sessions::load_session;
use crate::state::AppState;
use crate::workflow::DocumentQuery;

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: DocumentStatus,
}

#[derive(Deserialize)]
pub struct AnalysesQuery {
    pub document_id: Option<String>,
}

/// GET /api/v1/sessions/:id/documents
pub async fn handle_list_documents(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<Vec<StoredDocument>>, AppError> {
    let engine = load_session(&state, id).await?;
    Ok(Json(engine.list_documents(&query).await?))
}

/// PATCH /api/v1/sessions/:id/documents/:doc_id/status
pub async fn handle_set_status(
    State(state): State<AppState>,
    Path((id, doc_id)): Path<(Uuid, String)>,
    Json(req): Json<StatusRequest>,
) -> Result<StatusCode, AppError> {
    let engine = load_session(&state, id).await?;
    engine
        .set_status(&DocumentId::from(doc_id.as_str()), req.status)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/sessions/:id/analyses
pub async fn handle_list_analyses(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AnalysesQuery>,
) -> Result<Json<Vec<Value>>, AppError> {
    let engine = load_session(&state, id).await?;
    let document_id = query.document_id.as_deref().map(DocumentId::from);
    Ok(Json(engine.list_analyses(document_id.as_ref()).await?))
}
