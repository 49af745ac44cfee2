//! Manifest model and change indexing for the Vellum sync engine

pub mod errors;
pub mod filters;
pub mod indexer;
pub mod manifest;

pub use errors::{IndexError, Result};
pub use filters::FilterSet;
pub use indexer::ChangeIndexer;
pub use manifest::{hash_bytes, Manifest, ManifestEntry};
