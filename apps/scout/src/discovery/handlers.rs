//! Axum route handlers for the Discovery API.

use anyhow::Context;
use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::requirement::JobRequirement;
use crate::models::search::DiscoveryResponse;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DiscoveryRequest {
    #[serde(flatten)]
    pub requirement: JobRequirement,
    /// Stop early with partial results instead of waiting out quota pressure.
    #[serde(default)]
    pub degraded_mode: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/discovery/search
///
/// Finds and enriches candidates for a structured job requirement.
/// The pipeline runs on its own task; a panic inside it is reported as INTERNAL_ERROR.
pub async fn handle_search(
    State(state): State<AppState>,
    Json(request): Json<DiscoveryRequest>,
) -> Result<Json<DiscoveryResponse>, AppError> {
    let orchestrator = state.orchestrator.clone();
    let response = tokio::spawn(async move {
        orchestrator
            .discover(&request.requirement, request.degraded_mode)
            .await
    })
    .await
    .context("Discovery task failed")??;

    Ok(Json(response))
}
