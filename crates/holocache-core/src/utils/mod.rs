//! Utility functions for reference parsing and display formatting.

pub mod format;
pub mod reference;

// Re-export commonly used functions at module level
pub use format::{percent, truncate_string};
pub use reference::extract_uid;
