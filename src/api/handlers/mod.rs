use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::db::Database;
use crate::error::StoreError;
use crate::models::*;

// ============================================================
// Error Handling
// ============================================================

/// Map a store error to a response.
///
/// Conflicts are the caller's concern and are reported as-is. Everything
/// else is logged server-side and answered with a generic message so that
/// storage details do not leak to clients.
fn store_error(e: StoreError) -> (StatusCode, String) {
    match e {
        StoreError::Conflict { .. } => {
            tracing::warn!("Conflict: {}", e);
            (StatusCode::CONFLICT, e.to_string())
        }
        e => {
            tracing::error!("Internal error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

fn feature_not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Feature not found".to_string())
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Features
// ============================================================

/// Query parameters for listing features.
#[derive(Debug, Deserialize)]
pub struct ListFeaturesQuery {
    /// Restrict results to one project. An empty value means no filter.
    pub project: Option<String>,
}

pub async fn list_features(
    State(db): State<Database>,
    Path(organization): Path<String>,
    Query(query): Query<ListFeaturesQuery>,
) -> Result<Json<Vec<Feature>>, (StatusCode, String)> {
    let project = query.project.as_deref().filter(|p| !p.is_empty());
    db.list_features(&organization, project)
        .map(Json)
        .map_err(store_error)
}

pub async fn get_feature(
    State(db): State<Database>,
    Path((organization, id)): Path<(String, String)>,
) -> Result<Json<Feature>, (StatusCode, String)> {
    db.get_feature(&organization, &id)
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(feature_not_found)
}

/// The organization in the path is the scoping key; it replaces whatever
/// organization the body names.
pub async fn create_feature(
    State(db): State<Database>,
    Path(organization): Path<String>,
    Json(mut feature): Json<Feature>,
) -> Result<(StatusCode, Json<Feature>), (StatusCode, String)> {
    feature.organization = organization;
    db.create_feature(&feature).map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(feature)))
}

pub async fn update_feature(
    State(db): State<Database>,
    Path((organization, id)): Path<(String, String)>,
    Json(patch): Json<FeaturePatch>,
) -> Result<StatusCode, (StatusCode, String)> {
    if db
        .update_feature(&organization, &id, &patch)
        .map_err(store_error)?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(feature_not_found())
    }
}

/// Deleting an absent feature succeeds.
pub async fn delete_feature(
    State(db): State<Database>,
    Path((organization, id)): Path<(String, String)>,
) -> Result<StatusCode, (StatusCode, String)> {
    db.delete_feature(&organization, &id).map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}
