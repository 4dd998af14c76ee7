use async_trait::async_trait;

use crate::models::{EntityType, Record};

use super::ApiError;

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPage {
    pub items: Vec<Record>,
    pub has_next: bool,
    pub total_count: Option<usize>,
}

/// The remote dataset as seen by the sync engine.
///
/// Implementations make one request per call and never retry; retry policy
/// belongs to the orchestrator.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch one page (1-based) of a listing. Listings of types with inline
    /// detail come back already flattened into full records.
    async fn fetch_list(&self, entity: EntityType, page: u32) -> Result<ListPage, ApiError>;

    /// Fetch the full record for one entity.
    async fn fetch_detail(&self, entity: EntityType, uid: &str) -> Result<Record, ApiError>;
}
