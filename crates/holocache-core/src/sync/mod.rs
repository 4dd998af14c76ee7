//! The synchronization engine.
//!
//! `SyncOrchestrator` walks every entity type in a fixed order, lists it page
//! by page, enriches the listed items with detail fetches in throttled
//! batches, persists each batch as soon as it succeeds, and reports progress
//! on the `ProgressBus`. Only one run exists at a time; concurrent callers
//! attach to the run in flight and share its outcome.

pub mod error;
pub mod orchestrator;
pub mod state;

pub use error::SyncError;
pub use orchestrator::{SyncOrchestrator, SyncOutcome, SyncReport};
pub use state::SyncState;
