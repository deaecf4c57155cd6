//! Shared building blocks for repository-scoped retrieval: document and
//! result types, the capability traits implemented by the embedder, vector
//! index and answer generator crates, the error taxonomy and configuration.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
