use std::sync::Arc;

use crate::discovery::EnrichmentOrchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Holds the platform client, rate limiter, cache and settings for every request.
    pub orchestrator: Arc<EnrichmentOrchestrator>,
}
