// Candidate discovery: search criteria, the enrichment pipeline and its HTTP surface.
// Platform access goes through platform::PlatformApi; nothing here talks HTTP upstream.

pub mod criteria;
pub mod handlers;
pub mod orchestrator;

pub use orchestrator::{DiscoveryError, EnrichmentOrchestrator};
