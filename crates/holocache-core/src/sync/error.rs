use thiserror::Error;

use crate::api::ApiError;
use crate::models::EntityType;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to list {entity} page {page}: {source}")]
    Listing {
        entity: EntityType,
        page: u32,
        #[source]
        source: ApiError,
    },

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Sync task aborted: {0}")]
    Aborted(String),
}
