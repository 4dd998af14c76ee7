//! REST API client module for the Star Wars API.
//!
//! This module provides the `RemoteSource` seam the sync engine drives and
//! `SwapiClient`, its reqwest-backed implementation against swapi.tech.
//!
//! The API is read-only and paginated; every detail fetch is an independent
//! request whose failure is surfaced to the caller without retrying.

pub mod client;
pub mod error;
pub mod source;

pub use client::SwapiClient;
pub use error::ApiError;
pub use source::{ListPage, RemoteSource};
